//! records-api server binary.
//!
//! ```text
//!   Client ──▶ body parsing ─▶ CORS ─▶ security headers ─▶ logging
//!                                                             │
//!          ◀── error rendering ◀── not found ◀── routes ◀── rate limit (/api/)
//!                                                 │
//!                                   /api/health, /api/auth, /api/records
//!                                                 │
//!                                             data store
//! ```
//!
//! Exit codes: 0 after a graceful shutdown, 1 if configuration, the data
//! store connection, or binding the listener fails.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use records_api::config::{load_config, ObservabilityConfig};
use records_api::db::SqlConnector;
use records_api::lifecycle::{exit_status, shutdown_signal, Lifecycle};
use records_api::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "records-api")]
#[command(about = "REST API for user records", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_tracing(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        port = config.listener.port,
        rate_limit_max = config.rate_limit.max,
        rate_limit_window_ms = config.rate_limit.window_ms,
        "records-api starting"
    );

    if config.observability.metrics_enabled {
        if let Some(addr) = config.observability.metrics_socket() {
            metrics::init_metrics(addr);
        }
    }

    let connector = SqlConnector::new(config.database.clone());
    let result = Lifecycle::new().run(config, &connector, shutdown_signal()).await;
    match &result {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(e) => tracing::error!(error = %e, "Exiting"),
    }
    ExitCode::from(exit_status(&result))
}
