//! TideRoute Observability
//!
//! This crate provides observability features:
//! - Structured logging initialization (text or JSON)
//! - Metrics collection (Prometheus) fed by health snapshots and route outcomes

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, LoggingConfig, LoggingError, init_logging};
pub use metrics::Metrics;
