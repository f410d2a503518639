//! Restaurant API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  RESTAURANT API                    │
//!                        │                                                    │
//!   Client Request       │  ┌──────────┐   ┌──────────┐   ┌──────────┐        │
//!   ─────────────────────┼─▶│ request  │──▶│   rate   │──▶│   CSRF   │        │
//!                        │  │ id/trace │   │  limiter │   │  check   │        │
//!                        │  └──────────┘   └──────────┘   └────┬─────┘        │
//!                        │                                      ▼              │
//!                        │                 ┌────────────────────────────┐     │
//!                        │                 │ guard: token → member →    │     │
//!                        │                 │        requirement         │     │
//!                        │                 └─────────────┬──────────────┘     │
//!                        │                               ▼                    │
//!   Client Response      │  ┌──────────┐   ┌────────────────────────────┐     │      Hosted
//!   ◀────────────────────┼──│ security │◀──│ handler (members, invites) │◀────┼──▶  backend
//!                        │  │ headers  │   └─────────────┬──────────────┘     │
//!                        │  └──────────┘                 ▼                    │
//!                        │                       mail queue (paced) ──────────┼──▶  Email API
//!                        └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use restaurant_api::config::{load_config, ApiConfig};
use restaurant_api::config::watcher::ConfigWatcher;
use restaurant_api::lifecycle::{build_services, Shutdown};
use restaurant_api::observability::{logging, metrics};
use restaurant_api::ApiServer;

#[derive(Parser)]
#[command(name = "restaurant-api")]
#[command(about = "Authorization, CSRF and rate-limit guard for the restaurant apps", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ApiConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("restaurant-api v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = ?config.backend.mode,
        rate_limit_enabled = config.rate_limit.enabled,
        csrf_enabled = config.csrf.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        _ => {
            let (_, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let services = build_services(&config)?;
    let server = ApiServer::new(config, services);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown.trigger_on_signal().await;
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
