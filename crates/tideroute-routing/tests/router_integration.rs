//! Integration tests for Router
//!
//! These tests drive the router end to end with scripted clients, using
//! tokio's paused clock for everything time-dependent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tideroute_core::{
    HealthSink, HealthSnapshot, ProviderClient, ProviderError, ProviderResponse, RequestOptions,
};
use tideroute_routing::{
    MAX_RATE_LIMIT_COOLDOWN, ProviderConfig, RouteErrorKind, Router, RouterConfig, SelectionPolicy,
};

#[derive(Clone)]
enum Behavior {
    Succeed { content: String, latency: Duration },
    Fail(ProviderError),
    Hang,
}

// Client whose behavior can be switched between calls
#[derive(Clone)]
struct ScriptedClient {
    id: String,
    behavior: Arc<Mutex<Behavior>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedClient {
    fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn succeeding(id: &str, latency: Duration) -> Self {
        Self::new(
            id,
            Behavior::Succeed {
                content: format!("Response from {}", id),
                latency,
            },
        )
    }

    fn failing(id: &str, error: ProviderError) -> Self {
        Self::new(id, Behavior::Fail(error))
    }

    fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    fn get_call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        format!("sim-{}", self.id)
    }
}

#[async_trait::async_trait]
impl ProviderClient for ScriptedClient {
    async fn invoke(
        &self,
        _prompt: &str,
        _options: &RequestOptions,
        _timeout: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Succeed { content, latency } => {
                tokio::time::sleep(latency).await;
                Ok(ProviderResponse::new(content).with_tokens(30))
            }
            Behavior::Fail(error) => Err(error),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::server("hang ended"))
            }
        }
    }
}

fn provider(client: &ScriptedClient, task_types: &[&str], priority: u32) -> ProviderConfig {
    ProviderConfig::new(
        client.id.clone(),
        client.endpoint(),
        task_types.iter().map(|t| t.to_string()).collect(),
        priority,
    )
}

fn build_router(config: RouterConfig, clients: &[&ScriptedClient]) -> Router {
    let map: HashMap<String, Arc<dyn ProviderClient>> = clients
        .iter()
        .map(|client| {
            (
                client.endpoint(),
                Arc::new((*client).clone()) as Arc<dyn ProviderClient>,
            )
        })
        .collect();
    Router::new(config, map).unwrap()
}

fn fast_and_slow() -> (ScriptedClient, ScriptedClient, RouterConfig) {
    let fast = ScriptedClient::succeeding("Fast", Duration::from_millis(10));
    let slow = ScriptedClient::new("Slow", Behavior::Hang);
    let mut config = RouterConfig::new(vec![
        provider(&fast, &["code_generation", "analysis"], 1),
        provider(&slow, &["code_generation", "analysis"], 2),
    ]);
    config.attempt_timeout_ms = 1_000;
    (fast, slow, config)
}

#[tokio::test(start_paused = true)]
async fn test_fast_provider_wins() {
    let (fast, slow, config) = fast_and_slow();
    let router = build_router(config, &[&fast, &slow]);

    let success = router
        .route("code_generation", "hello", &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(success.provider_id, "Fast");
    assert_eq!(success.content, "Response from Fast");
    assert_eq!(success.tokens_used, Some(30));
    assert!(success.response_time_ms >= 10);
    assert_eq!(slow.get_call_count(), 0);

    for snapshot in router.health_snapshots() {
        assert_eq!(snapshot.failed_requests, 0, "{}", snapshot.provider_id);
    }
}

#[tokio::test(start_paused = true)]
async fn test_disabled_provider_is_skipped() {
    let (fast, slow, config) = fast_and_slow();
    let router = build_router(config, &[&fast, &slow]);

    for _ in 0..4 {
        router
            .registry()
            .mark_failure("Fast", &ProviderError::server("forced"));
    }

    let err = router
        .route("code_generation", "hello", &RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(fast.get_call_count(), 0);
    assert_eq!(slow.get_call_count(), 1);
    assert_eq!(err.kind(), RouteErrorKind::AllProvidersFailed);
    assert_eq!(err.attempted_count(), 1);
    assert_eq!(err.failures()[0].provider_id, "Slow");
    assert_eq!(err.failures()[0].error, ProviderError::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_cache_ttl_window() {
    let (fast, slow, mut config) = fast_and_slow();
    config.cache_ttl_secs = 60;
    let router = build_router(config, &[&fast, &slow]);
    let options = RequestOptions::default();

    let first = router.route("analysis", "x", &options).await.unwrap();
    assert!(!first.cached);
    assert_eq!(fast.get_call_count(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    let second = router.route("analysis", "x", &options).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.content, first.content);
    assert_eq!(second.provider_id, "Fast");
    assert_eq!(fast.get_call_count(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    let third = router.route("analysis", "x", &options).await.unwrap();
    assert!(!third.cached);
    assert_eq!(fast.get_call_count(), 2);
}

#[tokio::test]
async fn test_identical_requests_invoke_once() {
    let a = ScriptedClient::succeeding("a", Duration::ZERO);
    let b = ScriptedClient::succeeding("b", Duration::ZERO);
    let router = build_router(
        RouterConfig::new(vec![
            provider(&a, &["analysis"], 1),
            provider(&b, &["analysis"], 1),
        ]),
        &[&a, &b],
    );
    let options = RequestOptions::default();

    let first = router.route("analysis", "same", &options).await.unwrap();
    let second = router.route("analysis", "same", &options).await.unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(a.get_call_count() + b.get_call_count(), 1);
}

#[tokio::test]
async fn test_exhaustion_reports_each_provider_once() {
    let clients = vec![
        ScriptedClient::failing("p1", ProviderError::server("500")),
        ScriptedClient::failing("p2", ProviderError::auth("401")),
        ScriptedClient::failing("p3", ProviderError::rate_limited()),
    ];
    let providers = clients
        .iter()
        .enumerate()
        .map(|(i, c)| provider(c, &["analysis"], i as u32))
        .collect();
    let refs: Vec<&ScriptedClient> = clients.iter().collect();
    let router = build_router(RouterConfig::new(providers), &refs);

    let err = router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), RouteErrorKind::AllProvidersFailed);
    assert_eq!(err.attempted_count(), 3);
    let mut ids: Vec<&str> = err.failures().iter().map(|f| f.provider_id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    for client in &clients {
        assert_eq!(client.get_call_count(), 1);
    }

    // Failed routes are not cached
    assert!(router.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_isolation() {
    let limited = ScriptedClient::failing("limited", ProviderError::rate_limited());
    let backup = ScriptedClient::succeeding("backup", Duration::ZERO);
    let mut config = RouterConfig::new(vec![
        provider(&limited, &["analysis"], 1),
        provider(&backup, &["analysis"], 2),
    ]);
    config.health.rate_limit_cooldown_secs = 60;
    config.cache_ttl_secs = 0;
    let router = build_router(config, &[&limited, &backup]);
    let options = RequestOptions::default();

    let success = router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(success.provider_id, "backup");
    assert_eq!(limited.get_call_count(), 1);

    let snapshot = router.health_snapshot("limited").unwrap();
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(snapshot.failed_requests, 0);

    // Immediately ineligible
    limited.set_behavior(Behavior::Succeed {
        content: "recovered".to_string(),
        latency: Duration::ZERO,
    });
    router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(limited.get_call_count(), 1);

    // Not before the deadline
    tokio::time::advance(Duration::from_secs(59)).await;
    router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(limited.get_call_count(), 1);

    // Eligible again at the deadline
    tokio::time::advance(Duration::from_secs(1)).await;
    let success = router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(success.provider_id, "limited");
    assert_eq!(limited.get_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_extreme_retry_after_hints() {
    let stalled = ScriptedClient::failing(
        "stalled",
        ProviderError::RateLimited {
            retry_after_secs: Some(u64::MAX),
        },
    );
    let eager = ScriptedClient::failing(
        "eager",
        ProviderError::RateLimited {
            retry_after_secs: Some(0),
        },
    );
    let backup = ScriptedClient::succeeding("backup", Duration::ZERO);
    let mut config = RouterConfig::new(vec![
        provider(&stalled, &["analysis"], 1),
        provider(&eager, &["analysis"], 2),
        provider(&backup, &["analysis"], 3),
    ]);
    config.health.rate_limit_cooldown_secs = 60;
    config.cache_ttl_secs = 0;
    let router = build_router(config, &[&stalled, &eager, &backup]);
    let options = RequestOptions::default();

    let success = router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(success.provider_id, "backup");

    // Both limited providers sit out the next call
    router.route("analysis", "x", &options).await.unwrap();
    assert_eq!(stalled.get_call_count(), 1);
    assert_eq!(eager.get_call_count(), 1);

    let stalled_snapshot = router.health_snapshot("stalled").unwrap();
    assert_eq!(
        stalled_snapshot.cooldown_remaining,
        Some(MAX_RATE_LIMIT_COOLDOWN)
    );
    let eager_snapshot = router.health_snapshot("eager").unwrap();
    assert_eq!(eager_snapshot.cooldown_remaining, Some(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_priority_beats_success_rate() {
    let a = ScriptedClient::succeeding("A", Duration::ZERO);
    let b = ScriptedClient::succeeding("B", Duration::ZERO);
    let mut config = RouterConfig::new(vec![
        provider(&b, &["analysis"], 2),
        provider(&a, &["analysis"], 1),
    ]);
    config.cache_ttl_secs = 0;
    let router = build_router(config, &[&a, &b]);

    // A at 0.90, B at 0.99
    for _ in 0..9 {
        router.registry().mark_success("A");
    }
    router.registry().mark_failure("A", &ProviderError::Timeout);
    for _ in 0..99 {
        router.registry().mark_success("B");
    }
    router.registry().mark_failure("B", &ProviderError::Timeout);

    for _ in 0..10 {
        let success = router
            .route("analysis", "x", &RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(success.provider_id, "A");
    }
    assert_eq!(b.get_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_route_not_recorded() {
    let hung = ScriptedClient::new("hung", Behavior::Hang);
    let router = Arc::new(build_router(
        RouterConfig::new(vec![provider(&hung, &["analysis"], 1)]),
        &[&hung],
    ));

    let task = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            router
                .route("analysis", "x", &RequestOptions::default())
                .await
        })
    };

    // Let the attempt start, then cancel the whole call
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hung.get_call_count(), 1);
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let snapshot = router.health_snapshot("hung").unwrap();
    assert_eq!(snapshot.total_requests, 0);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_override() {
    let slowish = ScriptedClient::succeeding("slowish", Duration::from_millis(200));
    let router = build_router(
        RouterConfig::new(vec![provider(&slowish, &["analysis"], 1)]),
        &[&slowish],
    );

    let err = router
        .route(
            "analysis",
            "x",
            &RequestOptions::default().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.failures()[0].error, ProviderError::Timeout);

    // The router default (30s) is ample
    let success = router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(success.provider_id, "slowish");
}

#[tokio::test(start_paused = true)]
async fn test_attempt_pacing() {
    let p1 = ScriptedClient::failing("p1", ProviderError::server("500"));
    let p2 = ScriptedClient::failing("p2", ProviderError::server("500"));
    let p3 = ScriptedClient::succeeding("p3", Duration::ZERO);
    let mut config = RouterConfig::new(vec![
        provider(&p1, &["analysis"], 1),
        provider(&p2, &["analysis"], 2),
        provider(&p3, &["analysis"], 3),
    ]);
    config.attempt_pacing_ms = 250;
    let router = build_router(config, &[&p1, &p2, &p3]);

    let started = tokio::time::Instant::now();
    let success = router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(success.provider_id, "p3");
    // Two gaps between three attempts
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(750), "{:?}", elapsed);
}

#[tokio::test]
async fn test_concurrent_routes() {
    let a = ScriptedClient::succeeding("a", Duration::from_millis(1));
    let b = ScriptedClient::succeeding("b", Duration::from_millis(1));
    let router = Arc::new(build_router(
        RouterConfig::new(vec![
            provider(&a, &["analysis"], 1),
            provider(&b, &["analysis"], 2),
        ]),
        &[&a, &b],
    ));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                router
                    .route("analysis", &format!("prompt {}", i), &RequestOptions::default())
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(a.get_call_count() + b.get_call_count(), 20);
    let total: u64 = router
        .health_snapshots()
        .iter()
        .map(|s| s.total_requests)
        .sum();
    assert_eq!(total, 20);
    assert_eq!(router.cache().len(), 20);
}

#[tokio::test]
async fn test_weighted_policy_spreads_load() {
    let a = ScriptedClient::succeeding("a", Duration::ZERO);
    let b = ScriptedClient::succeeding("b", Duration::ZERO);
    let mut config = RouterConfig::new(vec![
        provider(&a, &["analysis"], 1),
        provider(&b, &["analysis"], 2),
    ]);
    config.cache_ttl_secs = 0;
    let router = build_router(config, &[&a, &b]);

    // Priority policy always picks a
    for _ in 0..20 {
        router
            .route("analysis", "x", &RequestOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(b.get_call_count(), 0);

    router.set_policy(SelectionPolicy::WeightedRandom);
    for _ in 0..200 {
        router
            .route("analysis", "x", &RequestOptions::default())
            .await
            .unwrap();
    }
    assert!(b.get_call_count() > 0);
    assert!(a.get_call_count() > 20);
}

#[derive(Default)]
struct CountingSink {
    snapshots: Mutex<Vec<HealthSnapshot>>,
}

impl HealthSink for CountingSink {
    fn on_health_update(&self, snapshot: &HealthSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

#[tokio::test]
async fn test_health_sink_receives_every_outcome() {
    let bad = ScriptedClient::failing("bad", ProviderError::Timeout);
    let good = ScriptedClient::succeeding("good", Duration::ZERO);
    let sink = Arc::new(CountingSink::default());
    let router = build_router(
        RouterConfig::new(vec![
            provider(&bad, &["analysis"], 1),
            provider(&good, &["analysis"], 2),
        ]),
        &[&bad, &good],
    )
    .with_health_sink(sink.clone());

    router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap();
    // Cache hit: no health mutation, no snapshot
    router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap();

    let snapshots = sink.snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].provider_id, "bad");
    assert_eq!(snapshots[0].failed_requests, 1);
    assert_eq!(snapshots[1].provider_id, "good");
    assert_eq!(snapshots[1].successful_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_sweeper_reclaims_unread_entries() {
    let a = ScriptedClient::succeeding("a", Duration::ZERO);
    let mut config = RouterConfig::new(vec![provider(&a, &["analysis"], 1)]);
    config.cache_ttl_secs = 10;
    config.cache_sweep_interval_secs = 5;
    let router = build_router(config, &[&a]);
    let sweeper = router.spawn_cache_sweeper();

    for i in 0..5 {
        router
            .route("analysis", &format!("prompt {}", i), &RequestOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(router.cache().len(), 5);

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(router.cache().is_empty());

    sweeper.shutdown().await;
}

#[tokio::test]
async fn test_operator_reset_restores_eligibility() {
    let flaky = ScriptedClient::failing("flaky", ProviderError::server("500"));
    let mut config = RouterConfig::new(vec![provider(&flaky, &["analysis"], 1)]);
    config.cache_ttl_secs = 0;
    let router = build_router(config, &[&flaky]);

    for _ in 0..4 {
        let _ = router.route("analysis", "x", &RequestOptions::default()).await;
    }
    let err = router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RouteErrorKind::NoHealthyProviders);
    assert_eq!(flaky.get_call_count(), 4);

    flaky.set_behavior(Behavior::Succeed {
        content: "back".to_string(),
        latency: Duration::ZERO,
    });
    router.reset_all();

    let success = router
        .route("analysis", "x", &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(success.content, "back");
}
