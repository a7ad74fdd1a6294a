//! TideRoute CLI
//!
//! Validate a configuration file and drive routed calls against the
//! simulated endpoints it registers.
//!
//! Usage:
//! ```bash
//! tideroute --config config.yaml validate
//! tideroute --config config.yaml simulate --task-type analysis --prompt "hi" --count 20
//! tideroute --config config.yaml metrics --task-type analysis --count 100
//! ```

mod simulated;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tideroute_config_file::AppConfig;
use tideroute_core::RequestOptions;
use tideroute_observability::{Metrics, init_logging};
use tideroute_routing::{RouteError, RouteSuccess, Router, SelectionPolicy};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "tideroute")]
#[command(about = "TideRoute - multi-provider request router", long_about = None)]
struct Cli {
    /// Path to the configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        global = true,
        env = "TIDEROUTE_CONFIG",
        default_value = "~/.tideroute/config.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file and print a summary
    Validate,
    /// Route requests through the configured providers, one JSON line per result
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        /// Print provider health snapshots after the run
        #[arg(long)]
        health: bool,
    },
    /// Route requests, then print Prometheus metrics instead of results
    Metrics {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Task type to route
    #[arg(short, long)]
    task_type: String,

    #[arg(short, long, default_value = "hello")]
    prompt: String,

    /// Number of route calls
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// Route calls in flight at once
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Override the configured selection policy
    #[arg(long)]
    policy: Option<SelectionPolicy>,

    /// Per-attempt timeout override in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Validate => {
            print_summary(&config);
        }
        Commands::Simulate { run, health } => {
            init_logging(&config.logging)?;
            let metrics = Arc::new(Metrics::new()?);
            let router = build_router(config, &run, &metrics)?;

            let results = run_routes(&router, &run).await;
            for result in &results {
                println!("{}", result_line(result)?);
            }

            if health {
                let snapshots = router.health_snapshots();
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            }
        }
        Commands::Metrics { run } => {
            init_logging(&config.logging)?;
            let metrics = Arc::new(Metrics::new()?);
            let router = build_router(config, &run, &metrics)?;

            run_routes(&router, &run).await;
            metrics.update_cache_entries(router.cache().len());
            print!("{}", metrics.render()?);
        }
    }

    Ok(())
}

fn print_summary(config: &AppConfig) {
    println!("Configuration OK");
    println!("  policy:           {}", config.router.policy);
    println!("  cache ttl:        {}s", config.router.cache_ttl_secs);
    println!("  attempt timeout:  {}ms", config.router.attempt_timeout_ms);
    println!("  providers:");
    for provider in &config.router.providers {
        println!(
            "    {} (priority {}, endpoint {}) -> {}",
            provider.display_name(),
            provider.priority,
            provider.endpoint,
            provider.capabilities.join(", ")
        );
    }
    println!("  endpoints:");
    for (handle, endpoint) in &config.endpoints {
        println!("    {} ({})", handle, endpoint.kind());
    }
}

fn build_router(
    config: AppConfig,
    run: &RunArgs,
    metrics: &Arc<Metrics>,
) -> anyhow::Result<Router> {
    let clients = simulated::clients_for(&config.endpoints);
    let router = Router::new(config.router, clients)?
        .with_health_sink(metrics.clone())
        .with_observer(metrics.clone());

    if let Some(policy) = run.policy {
        router.set_policy(policy);
    }

    info!(
        "Router ready with {} providers ({} policy)",
        router.providers().len(),
        router.policy()
    );
    Ok(router)
}

async fn run_routes(router: &Router, run: &RunArgs) -> Vec<Result<RouteSuccess, RouteError>> {
    let mut options = RequestOptions::default();
    if let Some(ms) = run.timeout_ms {
        options = options.with_timeout(std::time::Duration::from_millis(ms));
    }

    let options = &options;
    let results: Vec<_> = futures::stream::iter(0..run.count)
        .map(|_| router.route(&run.task_type, &run.prompt, options))
        .buffered(run.concurrency.max(1))
        .collect()
        .await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    debug!("{} of {} route calls succeeded", succeeded, results.len());
    results
}

fn result_line(result: &Result<RouteSuccess, RouteError>) -> serde_json::Result<String> {
    match result {
        Ok(success) => serde_json::to_string(success),
        Err(err) => serde_json::to_string(&serde_json::json!({
            "error": err.kind(),
            "message": err.to_string(),
            "failures": err.failures(),
        })),
    }
}
