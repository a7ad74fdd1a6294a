//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for TideRoute:
//! - Route outcomes (success, cache hit, no healthy providers, all failed)
//! - Route and per-attempt latency histograms
//! - Provider attempt counts by result
//! - Provider health gauges, fed from health snapshots
//! - Response cache size

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tideroute_core::{
    HealthSink, HealthSnapshot, HealthStatus, ProviderErrorKind, RouteObserver, RouteOutcome,
};

/// Metrics collector for TideRoute
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Route metrics
    /// Route calls by task type and terminal outcome
    pub routes_total: CounterVec,
    /// End-to-end route duration
    pub route_duration_seconds: HistogramVec,

    // Attempt metrics
    /// Provider attempts by result (`success` or an error kind)
    pub provider_attempts_total: CounterVec,
    /// Single attempt duration
    pub provider_attempt_duration_seconds: HistogramVec,

    // Health metrics
    /// Provider health status (0=healthy, 1=unproven, 2=unhealthy, 3=rate_limited)
    pub provider_health_status: GaugeVec,
    /// Provider success rate (0.0-1.0)
    pub provider_success_rate: GaugeVec,
    pub provider_consecutive_failures: GaugeVec,
    /// Seconds left in a rate-limit cooldown (0 when none)
    pub provider_cooldown_remaining_seconds: GaugeVec,

    // Cache metrics
    pub cache_entries: Gauge,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let routes_total = CounterVec::new(
            Opts::new("tideroute_routes_total", "Total number of route calls"),
            &["task_type", "outcome"],
        )?;

        let route_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tideroute_route_duration_seconds",
                "Route call duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
            &["task_type", "outcome"],
        )?;

        let provider_attempts_total = CounterVec::new(
            Opts::new(
                "tideroute_provider_attempts_total",
                "Total number of provider attempts",
            ),
            &["provider", "result"],
        )?;

        let provider_attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tideroute_provider_attempt_duration_seconds",
                "Provider attempt duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider"],
        )?;

        let provider_health_status = GaugeVec::new(
            Opts::new(
                "tideroute_provider_health_status",
                "Provider health status (0=healthy, 1=unproven, 2=unhealthy, 3=rate_limited)",
            ),
            &["provider"],
        )?;

        let provider_success_rate = GaugeVec::new(
            Opts::new(
                "tideroute_provider_success_rate",
                "Provider success rate (0.0-1.0)",
            ),
            &["provider"],
        )?;

        let provider_consecutive_failures = GaugeVec::new(
            Opts::new(
                "tideroute_provider_consecutive_failures",
                "Consecutive failed attempts since the last success",
            ),
            &["provider"],
        )?;

        let provider_cooldown_remaining_seconds = GaugeVec::new(
            Opts::new(
                "tideroute_provider_cooldown_remaining_seconds",
                "Seconds until a rate-limited provider becomes eligible again",
            ),
            &["provider"],
        )?;

        let cache_entries = Gauge::with_opts(Opts::new(
            "tideroute_cache_entries",
            "Number of entries in the response cache",
        ))?;

        // Register all metrics
        registry.register(Box::new(routes_total.clone()))?;
        registry.register(Box::new(route_duration_seconds.clone()))?;
        registry.register(Box::new(provider_attempts_total.clone()))?;
        registry.register(Box::new(provider_attempt_duration_seconds.clone()))?;
        registry.register(Box::new(provider_health_status.clone()))?;
        registry.register(Box::new(provider_success_rate.clone()))?;
        registry.register(Box::new(provider_consecutive_failures.clone()))?;
        registry.register(Box::new(provider_cooldown_remaining_seconds.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            routes_total,
            route_duration_seconds,
            provider_attempts_total,
            provider_attempt_duration_seconds,
            provider_health_status,
            provider_success_rate,
            provider_consecutive_failures,
            provider_cooldown_remaining_seconds,
            cache_entries,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// Record the terminal outcome of a route call
    pub fn record_route(&self, task_type: &str, outcome: RouteOutcome, duration_secs: f64) {
        self.routes_total
            .with_label_values(&[task_type, outcome.as_str()])
            .inc();
        self.route_duration_seconds
            .with_label_values(&[task_type, outcome.as_str()])
            .observe(duration_secs);
    }

    /// Record one provider attempt
    pub fn record_attempt(
        &self,
        provider: &str,
        error: Option<ProviderErrorKind>,
        duration_secs: f64,
    ) {
        let result = error.map_or("success", |kind| kind.as_str());
        self.provider_attempts_total
            .with_label_values(&[provider, result])
            .inc();
        self.provider_attempt_duration_seconds
            .with_label_values(&[provider])
            .observe(duration_secs);
    }

    /// Update the health gauges for one provider
    pub fn update_provider_health(&self, snapshot: &HealthSnapshot) {
        let provider = snapshot.provider_id.as_str();
        self.provider_health_status
            .with_label_values(&[provider])
            .set(health_status_value(snapshot.status));
        self.provider_success_rate
            .with_label_values(&[provider])
            .set(snapshot.success_rate);
        self.provider_consecutive_failures
            .with_label_values(&[provider])
            .set(f64::from(snapshot.consecutive_failures));
        self.provider_cooldown_remaining_seconds
            .with_label_values(&[provider])
            .set(
                snapshot
                    .cooldown_remaining
                    .map_or(0.0, |remaining| remaining.as_secs_f64()),
            );
    }

    pub fn update_cache_entries(&self, count: usize) {
        self.cache_entries.set(count as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

impl HealthSink for Metrics {
    fn on_health_update(&self, snapshot: &HealthSnapshot) {
        self.update_provider_health(snapshot);
    }
}

impl RouteObserver for Metrics {
    fn on_route_complete(&self, task_type: &str, outcome: RouteOutcome, elapsed: Duration) {
        self.record_route(task_type, outcome, elapsed.as_secs_f64());
    }

    fn on_attempt(&self, provider_id: &str, error: Option<ProviderErrorKind>, elapsed: Duration) {
        self.record_attempt(provider_id, error, elapsed.as_secs_f64());
    }
}

/// Gauge encoding of a health status
pub fn health_status_value(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 0.0,
        HealthStatus::Unproven => 1.0,
        HealthStatus::Unhealthy => 2.0,
        HealthStatus::RateLimited => 3.0,
    }
}
