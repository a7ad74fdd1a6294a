//! Router configuration

use crate::health::HealthThresholds;
use crate::provider_config::ProviderConfig;
use crate::strategy::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tideroute_core::{Error, Result};

/// Configuration for a `Router`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Providers in registration order
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub policy: SelectionPolicy,

    /// Cache TTL in seconds (0 disables caching)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Attempts per route call (defaults to the number of eligible providers)
    #[serde(default)]
    pub max_attempts: Option<usize>,

    /// Delay between consecutive attempts within one route call
    #[serde(default)]
    pub attempt_pacing_ms: u64,

    #[serde(default)]
    pub health: HealthThresholds,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_sweep_interval_secs() -> u64 {
    60
}

fn default_attempt_timeout_ms() -> u64 {
    30_000
}

impl RouterConfig {
    /// Config with the given providers and defaults for everything else
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            policy: SelectionPolicy::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_sweep_interval_secs: default_cache_sweep_interval_secs(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            max_attempts: None,
            attempt_pacing_ms: 0,
            health: HealthThresholds::default(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn attempt_pacing(&self) -> Option<Duration> {
        (self.attempt_pacing_ms > 0).then(|| Duration::from_millis(self.attempt_pacing_ms))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::ConfigValidation(
                "at least one provider must be configured".to_string(),
            ));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(Error::ConfigValidation(
                "attempt_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.cache_sweep_interval_secs == 0 {
            return Err(Error::ConfigValidation(
                "cache_sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::ConfigValidation(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }
        self.health.validate().map_err(Error::ConfigValidation)?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider
                .validate()
                .map_err(|e| Error::InvalidProvider(e.to_string()))?;
            if !seen.insert(provider.id.as_str()) {
                return Err(Error::DuplicateProvider(provider.id.clone()));
            }
        }

        Ok(())
    }
}
