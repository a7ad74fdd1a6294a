//! Response cache
//!
//! Maps a request fingerprint to the response that first satisfied it.
//! Entries expire after a fixed TTL: lazily when a read finds them stale,
//! and in bulk by a background sweeper so that a cache with rare reads
//! does not grow without bound.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tideroute_core::ProviderResponse;
use tokio::time::{Instant, sleep};

/// Deterministic cache key derived from task type and normalized prompt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(task_type: &str, prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(task_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(normalize_prompt(prompt).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and collapse whitespace runs; case is preserved
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A cached response with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub response: ProviderResponse,
    /// Provider that produced the response
    pub provider_id: String,
    pub created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= ttl
    }
}

/// TTL cache of provider responses
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    /// A zero TTL disables caching
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn key(task_type: &str, prompt: &str) -> Fingerprint {
        Fingerprint::new(task_type, prompt)
    }

    /// Look up an entry, evicting it if it has expired
    pub fn get(&self, key: &Fingerprint) -> Option<CacheEntry> {
        let now = Instant::now();
        let ttl = self.ttl;

        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(ttl, now))
            .is_some()
        {
            tracing::debug!(fingerprint = %key, "Evicted expired cache entry");
            return None;
        }

        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite an entry
    pub fn put(&self, key: Fingerprint, response: ProviderResponse, provider_id: &str) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                response,
                provider_id: provider_id.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &Fingerprint) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(ttl, now);
            if expired {
                removed += 1;
            }
            !expired
        });

        removed
    }
}

/// Handle to a running sweeper task
pub struct SweepTask {
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl SweepTask {
    /// Signal the sweeper to shutdown gracefully
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Spawn a background task that sweeps `cache` every `interval`
pub fn spawn_sweeper(cache: Arc<ResponseCache>, interval: Duration) -> SweepTask {
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs_f64(),
            ttl_secs = cache.ttl().as_secs_f64(),
            "Starting cache sweeper"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache sweeper shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = cache.len(), "Cache sweep cycle");
                    }
                }
            }
        }
    });

    SweepTask { shutdown_tx }
}
