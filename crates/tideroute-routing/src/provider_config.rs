//! Provider configuration
//!
//! Static, immutable description of one provider: identity, the endpoint
//! handle that names its client in the registration map, the capability
//! tags it serves, and its ordering/scoring attributes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider id
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Endpoint handle (supports env var syntax: $VAR_NAME or ${VAR_NAME})
    pub endpoint: String,

    /// Capability tags (task types) this provider can serve
    pub capabilities: Vec<String>,

    /// Lower sorts first under the priority policy
    pub priority: u32,

    /// Advertised request budget per minute (informational)
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,

    #[serde(default)]
    pub cost_score: f64,

    #[serde(default)]
    pub speed_score: f64,

    #[serde(default)]
    pub quality_score: f64,

    #[serde(default)]
    pub free_tier: bool,
}

impl ProviderConfig {
    /// Create a provider with the required fields set and scores zeroed
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        capabilities: Vec<String>,
        priority: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            endpoint: endpoint.into(),
            capabilities,
            priority,
            rate_limit_per_minute: None,
            cost_score: 0.0,
            speed_score: 0.0,
            quality_score: 0.0,
            free_tier: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Whether this provider serves the given task type
    pub fn supports(&self, task_type: &str) -> bool {
        self.capabilities.iter().any(|tag| tag == task_type)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), ProviderConfigError> {
        if self.id.trim().is_empty() {
            return Err(ProviderConfigError::MissingField {
                provider_id: self.id.clone(),
                field: "id",
            });
        }
        if self.endpoint.trim().is_empty() {
            return Err(ProviderConfigError::MissingField {
                provider_id: self.id.clone(),
                field: "endpoint",
            });
        }
        if self.capabilities.is_empty() {
            return Err(ProviderConfigError::MissingField {
                provider_id: self.id.clone(),
                field: "capabilities",
            });
        }
        if self.capabilities.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ProviderConfigError::EmptyCapability {
                provider_id: self.id.clone(),
            });
        }

        for (field, score) in [
            ("cost_score", self.cost_score),
            ("speed_score", self.speed_score),
            ("quality_score", self.quality_score),
        ] {
            if !score.is_finite() || score < 0.0 {
                return Err(ProviderConfigError::InvalidScore {
                    provider_id: self.id.clone(),
                    field,
                    value: score,
                });
            }
        }

        Ok(())
    }

    /// Resolve environment variables in configuration
    /// Replaces $VAR_NAME or ${VAR_NAME} in the endpoint handle
    pub fn resolve_env_vars(&mut self) -> Result<(), ProviderConfigError> {
        self.endpoint = resolve_env_var(&self.endpoint)?;
        Ok(())
    }
}

/// Resolve a single environment variable reference
/// Supports: $VAR_NAME or ${VAR_NAME}
/// If no $ prefix, returns value as-is
fn resolve_env_var(value: &str) -> Result<String, ProviderConfigError> {
    let trimmed = value.trim();

    if let Some(var_name) = trimmed.strip_prefix('$') {
        let var_name = var_name
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(var_name);

        std::env::var(var_name).map_err(|_| ProviderConfigError::EnvVarNotFound {
            var_name: var_name.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}

/// Provider configuration errors
#[derive(Debug, Error)]
pub enum ProviderConfigError {
    #[error("Provider '{provider_id}' is missing required field '{field}'")]
    MissingField {
        provider_id: String,
        field: &'static str,
    },

    #[error("Provider '{provider_id}' has an empty capability tag")]
    EmptyCapability { provider_id: String },

    #[error("Provider '{provider_id}' has invalid {field}: {value}")]
    InvalidScore {
        provider_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("Environment variable not found: {var_name}")]
    EnvVarNotFound { var_name: String },
}
