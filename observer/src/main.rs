//! Crosslink Observer - Main entry point
//!
//! Watches the configured source chains for bridge events and relays them
//! to the coordinating ledger.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crosslink_observer::{
    config::{MetricsConfig, ObserverConfig},
    forwarder::{HttpCoordinatorClient, RelayForwarder},
    observers::HealthStatus,
    supervisor::Supervisor,
    ChainId,
};

/// Interval between health summaries in the log
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("crosslink-observer")
        .version(crosslink_observer::VERSION)
        .about("Crosslink Observer - Relays source-chain bridge events to the coordinating ledger")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("chains")
                .short('n')
                .long("chains")
                .value_name("CHAINS")
                .help("Comma-separated list of configured chains to observe (default: all enabled)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("check-config")
                .long("check-config")
                .help("Validate the configuration and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config = ObserverConfig::load(matches.get_one::<String>("config").map(String::as_str))
        .context("Failed to load configuration")?;

    // Initialize logging
    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.global.log_level.clone());
    init_logging(&log_level)?;

    info!(version = crosslink_observer::VERSION, "Starting Crosslink Observer");

    config.validate().context("Invalid configuration")?;
    info!(chains = config.chains.len(), "Configuration loaded successfully");

    let only = matches
        .get_one::<String>("chains")
        .map(|chains| parse_chains(chains))
        .transpose()?;

    if matches.get_flag("check-config") {
        let selected = config.enabled_chains(only.as_deref());
        info!(
            chains = ?selected.iter().map(|(chain, _)| chain.as_str()).collect::<Vec<_>>(),
            "Configuration is valid"
        );
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.global.worker_threads)
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(run(config, only))
}

/// Run the observers until a shutdown signal arrives
async fn run(config: ObserverConfig, only: Option<Vec<ChainId>>) -> Result<()> {
    if config.monitoring.metrics.enabled {
        init_metrics(&config.monitoring.metrics)?;
    }

    let client = HttpCoordinatorClient::new(&config.coordinator)
        .context("Failed to create coordinating ledger client")?;
    let forwarder = Arc::new(RelayForwarder::new(Arc::new(client)));

    let supervisor = Supervisor::start(&config, only.as_deref(), forwarder)
        .context("Failed to start observers")?;
    info!(chains = ?supervisor.chains(), "Observers running");

    // Set up graceful shutdown
    let shutdown_signal = setup_shutdown_signal();
    tokio::pin!(shutdown_signal);

    let mut health_ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
    health_ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received, stopping observers...");
                break;
            }
            _ = health_ticker.tick() => log_health(&supervisor),
        }
    }

    if let Err(e) = supervisor.shutdown().await {
        error!(error = %e, "Observers did not shut down cleanly");
    }

    info!("Crosslink Observer stopped");
    Ok(())
}

/// Initialize logging with the specified level
fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid log level: {}. Using 'info'", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("crosslink_observer={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Install the Prometheus exporter
fn init_metrics(config: &MetricsConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.prometheus_bind_address, config.prometheus_port)
        .parse()
        .context("Invalid Prometheus listen address")?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Parse comma-separated chain ids
fn parse_chains(chains: &str) -> Result<Vec<ChainId>> {
    chains
        .split(',')
        .map(|s| s.parse::<ChainId>().map_err(anyhow::Error::from))
        .collect()
}

/// Log a one-line health summary per observer
fn log_health(supervisor: &Supervisor) {
    for health in supervisor.health() {
        match health.status {
            HealthStatus::Healthy | HealthStatus::Unknown => info!(
                chain = %health.chain,
                status = ?health.status,
                watermark = ?health.watermark,
                head = ?health.last_head,
                forwarded = health.metrics.events_forwarded,
                skipped = health.metrics.events_skipped,
                "Observer health"
            ),
            HealthStatus::Degraded | HealthStatus::Unhealthy => warn!(
                chain = %health.chain,
                status = ?health.status,
                watermark = ?health.watermark,
                failures = health.consecutive_failures,
                last_error = ?health.last_error,
                "Observer health"
            ),
        }
    }
}

/// Set up graceful shutdown signal handling
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
