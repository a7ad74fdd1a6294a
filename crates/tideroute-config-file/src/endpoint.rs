//! Endpoint registrations
//!
//! Each entry in the `endpoints:` map names the client implementation that
//! serves a provider's endpoint handle.

use serde::{Deserialize, Serialize};
use tideroute_core::{ProviderError, ProviderErrorKind};

/// Endpoint definition, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointConfig {
    /// In-process endpoint with configurable latency and failure behavior
    Simulated(SimulatedEndpoint),
}

impl EndpointConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            EndpointConfig::Simulated(_) => "simulated",
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            EndpointConfig::Simulated(simulated) => simulated.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedEndpoint {
    /// Base latency per call
    #[serde(default)]
    pub latency_ms: u64,

    /// Extra random latency, uniform in `0..=jitter_ms`
    #[serde(default)]
    pub jitter_ms: u64,

    /// Probability (0.0 to 1.0) that a call fails with `error`
    #[serde(default)]
    pub failure_rate: f64,

    #[serde(default = "default_error")]
    pub error: ProviderErrorKind,

    /// Retry-after hint attached to rate-limit failures
    #[serde(default)]
    pub retry_after_secs: Option<u64>,

    /// Content returned on success (defaults to an echo of the prompt)
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tokens_used: Option<u32>,
}

fn default_error() -> ProviderErrorKind {
    ProviderErrorKind::ServerError
}

impl Default for SimulatedEndpoint {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            jitter_ms: 0,
            failure_rate: 0.0,
            error: default_error(),
            retry_after_secs: None,
            content: None,
            tokens_used: None,
        }
    }
}

impl SimulatedEndpoint {
    pub fn validate(&self) -> Result<(), String> {
        if !self.failure_rate.is_finite() || !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(format!(
                "failure_rate must be between 0.0 and 1.0, got {}",
                self.failure_rate
            ));
        }
        Ok(())
    }

    /// The error a failing call reports
    pub fn failure(&self) -> ProviderError {
        match self.error {
            ProviderErrorKind::Timeout => ProviderError::Timeout,
            ProviderErrorKind::RateLimited => ProviderError::RateLimited {
                retry_after_secs: self.retry_after_secs,
            },
            ProviderErrorKind::ServerError => ProviderError::server("simulated server error"),
            ProviderErrorKind::AuthError => ProviderError::auth("simulated authentication failure"),
        }
    }
}
