//! Router: the dispatch entry point
//!
//! The Router coordinates the registry, the selection policy and the
//! response cache:
//! - cache hits return immediately without touching provider health
//! - on a miss, eligible providers are ordered by the active policy
//! - each candidate gets one attempt with a bounded timeout
//! - every attempt outcome is recorded against the provider's health
//! - the first success is cached and returned; otherwise the caller gets a
//!   single aggregated failure

use crate::cache::{Fingerprint, ResponseCache, SweepTask, spawn_sweeper};
use crate::config::RouterConfig;
use crate::health::ProviderRegistry;
use crate::provider_config::ProviderConfig;
use crate::strategy::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tideroute_core::{
    Error, HealthSink, HealthSnapshot, ProviderClient, ProviderError, ProviderResponse,
    RequestOptions, Result, RouteObserver, RouteOutcome,
};
use tokio::time::Instant;
use tracing::Instrument;

/// A successfully routed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSuccess {
    pub content: String,

    /// Provider that produced the content (also for cached results)
    pub provider_id: String,

    pub response_time_ms: u64,

    #[serde(default)]
    pub tokens_used: Option<u32>,

    /// Whether the result was served from the cache
    pub cached: bool,
}

/// One failed attempt within a route call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub error: ProviderError,
}

/// Terminal routing failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("No healthy providers available for task type '{task_type}'")]
    NoHealthyProviders { task_type: String },

    #[error("All {} attempted providers failed for task type '{task_type}'", .failures.len())]
    AllProvidersFailed {
        task_type: String,
        failures: Vec<ProviderFailure>,
    },
}

/// Discriminant of `RouteError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteErrorKind {
    NoHealthyProviders,
    AllProvidersFailed,
}

impl RouteError {
    pub fn kind(&self) -> RouteErrorKind {
        match self {
            RouteError::NoHealthyProviders { .. } => RouteErrorKind::NoHealthyProviders,
            RouteError::AllProvidersFailed { .. } => RouteErrorKind::AllProvidersFailed,
        }
    }

    /// Per-provider reasons, in attempt order
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            RouteError::NoHealthyProviders { .. } => &[],
            RouteError::AllProvidersFailed { failures, .. } => failures,
        }
    }

    pub fn attempted_count(&self) -> usize {
        self.failures().len()
    }

    fn outcome(&self) -> RouteOutcome {
        match self {
            RouteError::NoHealthyProviders { .. } => RouteOutcome::NoHealthyProviders,
            RouteError::AllProvidersFailed { .. } => RouteOutcome::AllProvidersFailed,
        }
    }
}

/// Routes requests across a pool of providers
pub struct Router {
    /// Provider configuration and health
    registry: ProviderRegistry,

    /// Provider id to client, resolved from endpoint handles at construction
    clients: HashMap<String, Arc<dyn ProviderClient>>,

    cache: Arc<ResponseCache>,

    /// Active policy; read once per route call
    policy: RwLock<SelectionPolicy>,

    attempt_timeout: Duration,
    max_attempts: Option<usize>,
    attempt_pacing: Option<Duration>,
    sweep_interval: Duration,

    observer: Option<Arc<dyn RouteObserver>>,
}

impl Router {
    /// Create a router
    ///
    /// `endpoint_clients` maps endpoint handles to the client serving them.
    /// Every configured provider must name a handle present in the map.
    pub fn new(
        config: RouterConfig,
        endpoint_clients: HashMap<String, Arc<dyn ProviderClient>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut registry = ProviderRegistry::new(config.health.clone());
        let mut clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();

        for provider in &config.providers {
            let client = endpoint_clients.get(&provider.endpoint).ok_or_else(|| {
                Error::UnknownEndpoint {
                    provider_id: provider.id.clone(),
                    endpoint: provider.endpoint.clone(),
                }
            })?;
            clients.insert(provider.id.clone(), Arc::clone(client));
            registry.register(provider.clone())?;
        }

        tracing::info!(
            providers = registry.len(),
            policy = %config.policy,
            cache_ttl_secs = config.cache_ttl_secs,
            attempt_timeout_ms = config.attempt_timeout_ms,
            "Router initialized"
        );

        Ok(Self {
            registry,
            clients,
            cache: Arc::new(ResponseCache::new(config.cache_ttl())),
            policy: RwLock::new(config.policy),
            attempt_timeout: config.attempt_timeout(),
            max_attempts: config.max_attempts,
            attempt_pacing: config.attempt_pacing(),
            sweep_interval: config.cache_sweep_interval(),
            observer: None,
        })
    }

    /// Publish a health snapshot to `sink` after every recorded outcome
    pub fn with_health_sink(mut self, sink: Arc<dyn HealthSink>) -> Self {
        self.registry.set_health_sink(sink);
        self
    }

    /// Report attempts and terminal outcomes to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn RouteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Route a request to the first provider that can serve it
    pub async fn route(
        &self,
        task_type: &str,
        prompt: &str,
        options: &RequestOptions,
    ) -> std::result::Result<RouteSuccess, RouteError> {
        let span = tracing::info_span!(
            "route",
            request_id = %uuid::Uuid::new_v4(),
            task_type = task_type
        );

        let started = Instant::now();
        let result = self
            .dispatch(task_type, prompt, options, started)
            .instrument(span)
            .await;

        if let Some(observer) = &self.observer {
            let outcome = match &result {
                Ok(success) if success.cached => RouteOutcome::CacheHit,
                Ok(_) => RouteOutcome::Success,
                Err(err) => err.outcome(),
            };
            observer.on_route_complete(task_type, outcome, started.elapsed());
        }

        result
    }

    async fn dispatch(
        &self,
        task_type: &str,
        prompt: &str,
        options: &RequestOptions,
        started: Instant,
    ) -> std::result::Result<RouteSuccess, RouteError> {
        let key = Fingerprint::new(task_type, prompt);

        if let Some(entry) = self.cache.get(&key) {
            tracing::debug!(
                fingerprint = %key,
                provider = %entry.provider_id,
                "Cache hit"
            );
            return Ok(RouteSuccess {
                content: entry.response.content,
                provider_id: entry.provider_id,
                response_time_ms: elapsed_ms(started),
                tokens_used: entry.response.tokens_used,
                cached: true,
            });
        }
        tracing::debug!(fingerprint = %key, "Cache miss");

        let candidates = self.registry.eligible_for(task_type);
        if candidates.is_empty() {
            tracing::error!("No healthy providers for task type");
            return Err(RouteError::NoHealthyProviders {
                task_type: task_type.to_string(),
            });
        }

        let policy = self.policy();
        let ordered = policy.select(&candidates, &HashSet::new());
        let max_attempts = self
            .max_attempts
            .map_or(ordered.len(), |max| max.min(ordered.len()));
        let timeout = options.timeout_override.unwrap_or(self.attempt_timeout);

        tracing::debug!(
            policy = %policy,
            eligible = ordered.len(),
            max_attempts,
            "Route decision made"
        );

        let mut failures: Vec<ProviderFailure> = Vec::new();

        for (attempt, candidate) in ordered.iter().take(max_attempts).enumerate() {
            if attempt > 0 {
                if let Some(pacing) = self.attempt_pacing {
                    tokio::time::sleep(pacing).await;
                }
            }

            let provider_id = candidate.id();
            match self.try_provider(provider_id, prompt, options, timeout).await {
                Ok(response) => {
                    self.cache.put(key, response.clone(), provider_id);
                    return Ok(RouteSuccess {
                        content: response.content,
                        provider_id: provider_id.to_string(),
                        response_time_ms: elapsed_ms(started),
                        tokens_used: response.tokens_used,
                        cached: false,
                    });
                }
                Err(error) => failures.push(ProviderFailure {
                    provider_id: provider_id.to_string(),
                    error,
                }),
            }
        }

        let reasons: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.provider_id, f.error))
            .collect();
        tracing::error!(
            attempted = failures.len(),
            reasons = ?reasons,
            "All providers failed"
        );

        Err(RouteError::AllProvidersFailed {
            task_type: task_type.to_string(),
            failures,
        })
    }

    /// Make one attempt against a provider and record the outcome
    ///
    /// Health is only updated after the invocation resolves, so a route
    /// call dropped mid-attempt leaves the provider's counters untouched.
    async fn try_provider(
        &self,
        provider_id: &str,
        prompt: &str,
        options: &RequestOptions,
        timeout: Duration,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let Some(client) = self.clients.get(provider_id) else {
            tracing::error!(provider = provider_id, "No client registered for provider");
            return Err(ProviderError::server("no client registered"));
        };

        tracing::debug!(
            provider = provider_id,
            timeout_ms = timeout.as_millis() as u64,
            "Attempting request to provider"
        );

        let attempt_started = Instant::now();
        let result = match tokio::time::timeout(timeout, client.invoke(prompt, options, timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };
        let elapsed = attempt_started.elapsed();

        match &result {
            Ok(response) => {
                self.registry.mark_success(provider_id);
                tracing::info!(
                    provider = provider_id,
                    tokens = ?response.tokens_used,
                    latency_ms = elapsed.as_millis() as u64,
                    "Request succeeded"
                );
            }
            Err(err) => {
                self.registry.mark_failure(provider_id, err);
                tracing::warn!(
                    provider = provider_id,
                    kind = %err.kind(),
                    error = %err,
                    latency_ms = elapsed.as_millis() as u64,
                    "Request failed, trying next provider"
                );
            }
        }

        if let Some(observer) = &self.observer {
            observer.on_attempt(
                provider_id,
                result.as_ref().err().map(ProviderError::kind),
                elapsed,
            );
        }

        result
    }

    pub fn policy(&self) -> SelectionPolicy {
        *self
            .policy
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switch the selection policy for subsequent route calls
    pub fn set_policy(&self, policy: SelectionPolicy) {
        let mut current = self
            .policy
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = *current;
        if previous != policy {
            *current = policy;
            tracing::info!(from = %previous, to = %policy, "Selection policy changed");
        }
    }

    /// Clear a provider's counters and cooldown
    pub fn reset_provider(&self, provider_id: &str) -> Result<()> {
        self.registry.reset(provider_id)
    }

    pub fn reset_all(&self) {
        self.registry.reset_all();
    }

    pub fn health_snapshot(&self, provider_id: &str) -> Option<HealthSnapshot> {
        self.registry.snapshot(provider_id)
    }

    pub fn health_snapshots(&self) -> Vec<HealthSnapshot> {
        self.registry.snapshots()
    }

    pub fn providers(&self) -> &[Arc<ProviderConfig>] {
        self.registry.providers()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Start the periodic cache sweep at the configured interval
    pub fn spawn_cache_sweeper(&self) -> SweepTask {
        spawn_sweeper(Arc::clone(&self.cache), self.sweep_interval)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
