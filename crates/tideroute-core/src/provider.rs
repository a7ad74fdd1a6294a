//! Provider client trait definitions
//!
//! A `ProviderClient` is the external collaborator behind one provider
//! endpoint. The router never inspects provider names; it looks clients up
//! through a registration map keyed by endpoint handle and switches on the
//! typed `ProviderError` each invocation returns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Invoke the provider with a prompt
    ///
    /// `timeout` is the budget the router enforces for this attempt. Clients
    /// may use it to configure their own transport deadlines; the router
    /// enforces it independently.
    async fn invoke(
        &self,
        prompt: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

/// Caller-supplied knobs forwarded to the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum number of tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Per-attempt timeout override (replaces the router default)
    #[serde(default)]
    pub timeout_override: Option<Duration>,
}

impl RequestOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }
}

/// Successful provider output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated content
    pub content: String,

    /// Tokens consumed, if the provider reports them
    #[serde(default)]
    pub tokens_used: Option<u32>,
}

impl ProviderResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: None,
        }
    }

    pub fn with_tokens(mut self, tokens_used: u32) -> Self {
        self.tokens_used = Some(tokens_used);
        self
    }
}

/// Per-attempt failure reported by a provider client
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error(
        "Rate limit exceeded{}",
        .retry_after_secs.map(|s| format!(": retry after {}s", s)).unwrap_or_default()
    )]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },
}

impl ProviderError {
    pub fn server(message: impl Into<String>) -> Self {
        ProviderError::ServerError {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        ProviderError::AuthError {
            message: message.into(),
        }
    }

    pub fn rate_limited() -> Self {
        ProviderError::RateLimited {
            retry_after_secs: None,
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Timeout => ProviderErrorKind::Timeout,
            ProviderError::RateLimited { .. } => ProviderErrorKind::RateLimited,
            ProviderError::ServerError { .. } => ProviderErrorKind::ServerError,
            ProviderError::AuthError { .. } => ProviderErrorKind::AuthError,
        }
    }

    /// Rate limiting is not a quality signal about the provider
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    /// Provider-supplied hint for how long to back off
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after_secs } => {
                retry_after_secs.map(Duration::from_secs)
            }
            _ => None,
        }
    }
}

/// Discriminant of `ProviderError`, used for labels and config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    ServerError,
    AuthError,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::ServerError => "server_error",
            ProviderErrorKind::AuthError => "auth_error",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
