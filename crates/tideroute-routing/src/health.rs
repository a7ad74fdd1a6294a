//! Provider Registry and Health Tracking
//!
//! Holds the immutable provider configurations alongside mutable per-provider
//! health counters. Counters are updated only from routing outcomes
//! (`mark_success` / `mark_failure`) or an explicit operator reset, and are
//! used to decide which providers are eligible for a task type.
//!
//! Eligibility rules:
//! - `consecutive_failures <= failure_threshold`
//! - fewer than `min_sample` requests, or `success_rate >= min_success_rate`
//! - not inside a rate-limit cooldown window
//!
//! Rate limiting sets a cooldown but never counts toward consecutive
//! failures.

use crate::provider_config::ProviderConfig;
use crate::strategy::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tideroute_core::{
    Error, HealthSink, HealthSnapshot, HealthStatus, ProviderError, Result,
};
use tokio::time::Instant;

/// Upper bound on any rate-limit cooldown, configured or provider-supplied
pub const MAX_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Thresholds that decide whether a provider is eligible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failures tolerated before a provider is excluded
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Requests needed before the success rate is enforced
    #[serde(default = "default_min_sample")]
    pub min_sample: u64,

    /// Minimum success rate once `min_sample` is reached (0.0 to 1.0)
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,

    /// Cooldown applied after a rate-limit signal without retry-after
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_min_sample() -> u64 {
    10
}

fn default_min_success_rate() -> f64 {
    0.5
}

fn default_rate_limit_cooldown_secs() -> u64 {
    60
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            min_sample: default_min_sample(),
            min_success_rate: default_min_success_rate(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
        }
    }
}

impl HealthThresholds {
    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err("min_success_rate must be between 0.0 and 1.0".to_string());
        }
        if self.rate_limit_cooldown_secs == 0
            || self.rate_limit_cooldown_secs > MAX_RATE_LIMIT_COOLDOWN.as_secs()
        {
            return Err(format!(
                "rate_limit_cooldown_secs must be between 1 and {}",
                MAX_RATE_LIMIT_COOLDOWN.as_secs()
            ));
        }
        Ok(())
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

/// Mutable health counters for one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthState {
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Last successful use
    pub last_used: Option<Instant>,
    pub last_failure: Option<Instant>,
    pub rate_limit_cooldown_until: Option<Instant>,
}

impl HealthState {
    /// Success rate (0.0 to 1.0), optimistic when there is no data
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.rate_limit_cooldown_until
            .is_some_and(|until| now < until)
    }

    pub fn status(&self, thresholds: &HealthThresholds, now: Instant) -> HealthStatus {
        if self.in_cooldown(now) {
            return HealthStatus::RateLimited;
        }
        if self.consecutive_failures > thresholds.failure_threshold {
            return HealthStatus::Unhealthy;
        }
        if self.total_requests < thresholds.min_sample {
            return HealthStatus::Unproven;
        }
        if self.success_rate() >= thresholds.min_success_rate {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn is_eligible(&self, thresholds: &HealthThresholds, now: Instant) -> bool {
        self.status(thresholds, now).is_eligible()
    }

    fn record_success(&mut self, now: Instant) {
        self.successful_requests = self.successful_requests.saturating_add(1);
        self.total_requests = self.total_requests.saturating_add(1);
        self.consecutive_failures = 0;
        self.last_used = Some(now);
    }

    fn record_failure(&mut self, error: &ProviderError, cooldown: Duration, now: Instant) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.last_failure = Some(now);

        if error.is_rate_limit() {
            // A zero hint would leave the provider eligible
            let window = error
                .retry_after()
                .filter(|hint| !hint.is_zero())
                .unwrap_or(cooldown)
                .min(MAX_RATE_LIMIT_COOLDOWN);
            if let Some(until) = now.checked_add(window) {
                self.rate_limit_cooldown_until = Some(until);
            }
        } else {
            self.failed_requests = self.failed_requests.saturating_add(1);
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }

    fn snapshot(
        &self,
        provider_id: &str,
        thresholds: &HealthThresholds,
        now: Instant,
    ) -> HealthSnapshot {
        HealthSnapshot {
            provider_id: provider_id.to_string(),
            status: self.status(thresholds, now),
            consecutive_failures: self.consecutive_failures,
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            success_rate: self.success_rate(),
            since_last_used: self.last_used.map(|at| now.saturating_duration_since(at)),
            cooldown_remaining: self
                .rate_limit_cooldown_until
                .filter(|until| now < *until)
                .map(|until| until - now),
        }
    }
}

/// Registry of providers and their health
pub struct ProviderRegistry {
    /// Providers in registration order
    providers: Vec<Arc<ProviderConfig>>,
    /// Per-provider health counters
    health: Mutex<HashMap<String, HealthState>>,
    thresholds: HealthThresholds,
    sink: Option<Arc<dyn HealthSink>>,
}

impl ProviderRegistry {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            providers: Vec::new(),
            health: Mutex::new(HashMap::new()),
            thresholds,
            sink: None,
        }
    }

    /// Publish a snapshot to `sink` after every health update
    pub fn set_health_sink(&mut self, sink: Arc<dyn HealthSink>) {
        self.sink = Some(sink);
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Register a provider
    ///
    /// Validates required fields and rejects duplicate ids.
    pub fn register(&mut self, config: ProviderConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| Error::InvalidProvider(e.to_string()))?;

        if self.get(&config.id).is_some() {
            return Err(Error::DuplicateProvider(config.id));
        }

        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(config.id.clone(), HealthState::default());

        tracing::debug!(
            provider = %config.id,
            priority = config.priority,
            capabilities = ?config.capabilities,
            "Registered provider"
        );
        self.providers.push(Arc::new(config));
        Ok(())
    }

    pub fn get(&self, provider_id: &str) -> Option<&Arc<ProviderConfig>> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn providers(&self) -> &[Arc<ProviderConfig>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Record a successful request for a provider
    pub fn mark_success(&self, provider_id: &str) {
        let now = Instant::now();
        self.update(provider_id, |state| state.record_success(now), now);
    }

    /// Record a failed request for a provider
    pub fn mark_failure(&self, provider_id: &str, error: &ProviderError) {
        let now = Instant::now();
        let cooldown = self.thresholds.rate_limit_cooldown();
        self.update(
            provider_id,
            |state| state.record_failure(error, cooldown, now),
            now,
        );
    }

    /// Clear all counters and any cooldown for a provider
    pub fn reset(&self, provider_id: &str) -> Result<()> {
        if self.get(provider_id).is_none() {
            return Err(Error::UnknownProvider(provider_id.to_string()));
        }
        let now = Instant::now();
        self.update(provider_id, |state| *state = HealthState::default(), now);
        tracing::info!(provider = provider_id, "Provider health reset");
        Ok(())
    }

    pub fn reset_all(&self) {
        let mut health = self
            .health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for state in health.values_mut() {
            *state = HealthState::default();
        }
        tracing::info!("All provider health reset");
    }

    /// Providers supporting `task_type` that are currently eligible,
    /// in registration order
    pub fn eligible_for(&self, task_type: &str) -> Vec<Candidate> {
        let now = Instant::now();
        let health = self
            .health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.providers
            .iter()
            .filter(|provider| provider.supports(task_type))
            .filter_map(|provider| {
                let state = health.get(&provider.id)?;
                state
                    .is_eligible(&self.thresholds, now)
                    .then(|| Candidate::new(Arc::clone(provider), state.success_rate()))
            })
            .collect()
    }

    /// Copy of the raw counters for a provider
    pub fn health_state(&self, provider_id: &str) -> Option<HealthState> {
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(provider_id)
            .cloned()
    }

    pub fn snapshot(&self, provider_id: &str) -> Option<HealthSnapshot> {
        let now = Instant::now();
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(provider_id)
            .map(|state| state.snapshot(provider_id, &self.thresholds, now))
    }

    /// Snapshots for every provider, in registration order
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        let now = Instant::now();
        let health = self
            .health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.providers
            .iter()
            .filter_map(|provider| {
                health
                    .get(&provider.id)
                    .map(|state| state.snapshot(&provider.id, &self.thresholds, now))
            })
            .collect()
    }

    fn update(&self, provider_id: &str, apply: impl FnOnce(&mut HealthState), now: Instant) {
        let snapshot = {
            let mut health = self
                .health
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(state) = health.get_mut(provider_id) else {
                tracing::warn!(provider = provider_id, "Health update for unknown provider");
                return;
            };
            apply(state);
            state.snapshot(provider_id, &self.thresholds, now)
        };

        // Sink runs outside the lock
        if let Some(sink) = &self.sink {
            sink.on_health_update(&snapshot);
        }
    }
}
