//! promsvc - an instrumented HTTP service with periodic metrics export
//!
//! Usage:
//!     promsvc [--config <path>]
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use promsvc::config::{Config, SinkKind, load_config, load_config_from_env};
use promsvc::export::Exporter;
use promsvc::server::ServiceServer;
use promsvc::state::AppState;
use promsvc::util::init_logging;

/// An HTTP service that exposes and pushes its own Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "promsvc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults and environment if omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| {
            format!("failed to load configuration from '{}'", path.display())
        })?,
        None => load_config_from_env().context("failed to build configuration")?,
    };

    // Determine log level (CLI overrides config)
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);

    // Initialize logging
    init_logging(log_level, &config.global.log_format);

    // If --validate flag, just validate and exit
    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.server.listen);
        println!("  Metrics path: {}", config.server.metrics_path);
        match config.export.sink {
            SinkKind::Http => println!(
                "  Export: http -> {} every {} (timeout {})",
                config.export.collector_url.as_deref().unwrap_or("-"),
                humantime::format_duration(config.export.interval),
                humantime::format_duration(config.export.timeout)
            ),
            SinkKind::None => println!("  Export: disabled"),
        }
        return Ok(());
    }

    info!(
        config_path = ?cli.config,
        listen = %config.server.listen,
        metrics_path = %config.server.metrics_path,
        sink = ?config.export.sink,
        "promsvc starting"
    );

    run(config)
}

/// Run the service with the given configuration.
fn run(config: Config) -> Result<()> {
    // Create tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the service.
async fn run_async(config: Config) -> Result<()> {
    let state = AppState::new(config).context("failed to register service metrics")?;

    let mut handles = Vec::new();

    // Start the HTTP server
    let server = ServiceServer::bind(state.clone())
        .await
        .with_context(|| format!("failed to bind {}", state.config().server.listen))?;
    handles.push(tokio::spawn(server.run(state.shutdown().subscribe())));

    // Start the exporter
    match Exporter::from_config(&state.config().export, state.metrics().clone())
        .context("failed to create metrics exporter")?
    {
        Some(exporter) => {
            handles.push(tokio::spawn(exporter.run(state.shutdown().subscribe())));
        }
        None => info!("metrics export disabled"),
    }

    info!("promsvc is running");
    info!("press Ctrl+C to stop");

    // Wait for shutdown signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    // Signal all tasks to shut down
    state.trigger_shutdown();

    // Wait for all tasks to finish
    for handle in handles {
        let _ = handle.await;
    }

    info!("promsvc shut down complete");
    Ok(())
}
