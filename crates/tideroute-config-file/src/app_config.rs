//! Application configuration file

use crate::endpoint::EndpointConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tideroute_core::{Error, Result};
use tideroute_observability::{LogFormat, LoggingConfig};
use tideroute_routing::{RouterConfig, SelectionPolicy};
use tracing::{debug, error, warn};

/// Top-level configuration: router, logging and endpoint registrations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub router: RouterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Endpoint handle -> endpoint definition
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl AppConfig {
    /// Read, override from the environment, resolve `$VAR` handles and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.merge_env();
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file (TOML when the extension is `.toml`, YAML otherwise)
    ///
    /// # Errors
    /// - `Error::ConfigNotFound` if the file doesn't exist
    /// - `Error::Io` if it can't be read
    /// - `Error::Config` if it doesn't parse
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_home(path.as_ref())?;

        if !path.exists() {
            return Err(Error::ConfigNotFound);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            error!("Failed to read config file {:?}: {}", path, e);
            Error::Io(e)
        })?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|e| {
                error!("Failed to parse TOML config: {}", e);
                Error::Config(format!("Invalid TOML: {}", e))
            })?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents).map_err(|e| {
                error!("Failed to parse YAML config: {}", e);
                Error::Config(format!("Invalid YAML: {}", e))
            })?
        };

        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("TIDEROUTE_POLICY") {
            match val.parse::<SelectionPolicy>() {
                Ok(policy) => self.router.policy = policy,
                Err(e) => warn!("Ignoring TIDEROUTE_POLICY: {}", e),
            }
        }

        if let Ok(val) = std::env::var("TIDEROUTE_CACHE_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.router.cache_ttl_secs = secs,
                Err(_) => warn!("Ignoring invalid TIDEROUTE_CACHE_TTL_SECS '{}'", val),
            }
        }

        if let Ok(val) = std::env::var("TIDEROUTE_ATTEMPT_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => self.router.attempt_timeout_ms = ms,
                _ => warn!("Ignoring invalid TIDEROUTE_ATTEMPT_TIMEOUT_MS '{}'", val),
            }
        }

        if let Ok(val) = std::env::var("TIDEROUTE_LOG_LEVEL") {
            if !val.trim().is_empty() {
                self.logging.level = val;
            }
        }

        if let Ok(val) = std::env::var("TIDEROUTE_LOG_FORMAT") {
            match val.parse::<LogFormat>() {
                Ok(format) => self.logging.format = format,
                Err(e) => warn!("Ignoring TIDEROUTE_LOG_FORMAT: {}", e),
            }
        }
    }

    /// Replace `$VAR` / `${VAR}` endpoint handles with their environment values
    pub fn resolve_env_vars(&mut self) -> Result<()> {
        for provider in &mut self.router.providers {
            provider
                .resolve_env_vars()
                .map_err(|e| Error::Config(format!("provider '{}': {}", provider.id, e)))?;
        }
        Ok(())
    }

    /// Validate the router section and that every provider's endpoint is registered
    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;

        for (handle, endpoint) in &self.endpoints {
            endpoint.validate().map_err(|message| {
                Error::ConfigValidation(format!("endpoint '{}': {}", handle, message))
            })?;
        }

        for provider in &self.router.providers {
            if !self.endpoints.contains_key(&provider.endpoint) {
                return Err(Error::UnknownEndpoint {
                    provider_id: provider.id.clone(),
                    endpoint: provider.endpoint.clone(),
                });
            }
        }

        Ok(())
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}
