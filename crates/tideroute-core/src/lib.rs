//! TideRoute Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout TideRoute:
//! - Provider client trait and per-attempt error taxonomy
//! - Request options and provider responses
//! - Health snapshots, route outcomes and their observer contracts
//! - Core error types

pub mod error;
pub mod events;
pub mod provider;

pub use error::{Error, Result};
pub use events::{HealthSink, HealthSnapshot, HealthStatus, RouteObserver, RouteOutcome};
pub use provider::{ProviderClient, ProviderError, ProviderErrorKind, ProviderResponse, RequestOptions};
