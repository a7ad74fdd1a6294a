//! Health and routing events
//!
//! After every success or failure is recorded against a provider, the
//! registry publishes a `HealthSnapshot` to an optional `HealthSink`.
//! The router reports attempts and terminal outcomes to an optional
//! `RouteObserver`. Delivery is one-way; receivers must not block.

use crate::provider::ProviderErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classification of a provider's current health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Enough samples and success rate above threshold
    Healthy,
    /// Fewer requests than the minimum sample size (treated as healthy)
    Unproven,
    /// Too many consecutive failures or success rate below threshold
    Unhealthy,
    /// Inside a rate-limit cooldown window
    RateLimited,
}

impl HealthStatus {
    /// Whether a provider in this state may be attempted
    pub fn is_eligible(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Unproven)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unproven => "unproven",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::RateLimited => "rate_limited",
        }
    }
}

/// Point-in-time view of one provider's health counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub provider_id: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    /// Time since the provider last served a request successfully
    pub since_last_used: Option<Duration>,
    /// Time left before a rate-limit cooldown expires
    pub cooldown_remaining: Option<Duration>,
}

/// Receiver for health snapshots (metrics, dashboards, logs)
pub trait HealthSink: Send + Sync {
    fn on_health_update(&self, snapshot: &HealthSnapshot);
}

/// How a single route call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    Success,
    CacheHit,
    NoHealthyProviders,
    AllProvidersFailed,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Success => "success",
            RouteOutcome::CacheHit => "cache_hit",
            RouteOutcome::NoHealthyProviders => "no_healthy_providers",
            RouteOutcome::AllProvidersFailed => "all_providers_failed",
        }
    }
}

/// Receiver for per-call and per-attempt routing events
pub trait RouteObserver: Send + Sync {
    /// Called once per route call with its terminal outcome
    fn on_route_complete(&self, task_type: &str, outcome: RouteOutcome, elapsed: Duration);

    /// Called after every provider attempt; `error` is `None` on success
    fn on_attempt(
        &self,
        _provider_id: &str,
        _error: Option<ProviderErrorKind>,
        _elapsed: Duration,
    ) {
    }
}
