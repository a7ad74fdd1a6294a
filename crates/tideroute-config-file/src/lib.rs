//! File-based configuration for TideRoute
//!
//! Loads the router section, logging settings and endpoint registrations
//! from a single YAML or TOML file, then applies `TIDEROUTE_*` environment
//! overrides and resolves `$VAR` references in endpoint handles.
//!
//! # Example
//! ```no_run
//! # use tideroute_config_file::AppConfig;
//! # fn example() -> tideroute_core::Result<()> {
//! let config = AppConfig::load("~/.tideroute/config.yaml")?;
//! println!("{} providers", config.router.providers.len());
//! # Ok(())
//! # }
//! ```

mod app_config;
mod endpoint;

pub use app_config::AppConfig;
pub use endpoint::{EndpointConfig, SimulatedEndpoint};
