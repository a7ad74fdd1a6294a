//! TideRoute Routing Engine
//!
//! This crate provides the routing core for TideRoute:
//! - Provider registry with health tracking and rate-limit cooldowns
//! - Selection policies (priority order, weighted random)
//! - Response cache with TTL expiry and a background sweeper
//! - Router that dispatches requests with per-attempt timeouts and failover

pub mod cache;
pub mod config;
pub mod health;
pub mod provider_config;
pub mod provider_router;
pub mod strategy;

// Re-export commonly used types
pub use cache::{CacheEntry, Fingerprint, ResponseCache, SweepTask, spawn_sweeper};
pub use config::RouterConfig;
pub use health::{HealthState, HealthThresholds, MAX_RATE_LIMIT_COOLDOWN, ProviderRegistry};
pub use provider_config::{ProviderConfig, ProviderConfigError};
pub use provider_router::{ProviderFailure, RouteError, RouteErrorKind, RouteSuccess, Router};
pub use strategy::{Candidate, SelectionPolicy};
