//! Weighted Load Balancer
//!
//! Reverse proxy that spreads requests over weighted backends and routes
//! around unhealthy ones.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────┐
//!                          │                 BALANCER                      │
//!                          │                                               │
//!     Client Request       │  ┌─────────┐    ┌──────────┐    ┌──────────┐  │
//!     ─────────────────────┼─▶│  http   │───▶│ selector │───▶│ weighted │  │
//!                          │  │ server  │    │          │    │  random  │  │
//!                          │  └─────────┘    └────┬─────┘    └──────────┘  │
//!                          │                      │ healthy?               │
//!                          │                      ▼                        │
//!                          │               ┌──────────────┐  ┌──────────┐  │
//!                          │               │ status store │◀─│  health  │──┼──▶ HEAD probes
//!                          │               └──────────────┘  │ monitor  │  │
//!                          │                      ▲          └────┬─────┘  │
//!                          │                      │ wait          │release │
//!                          │               ┌──────────────┐       │        │
//!                          │               │   wait set   │◀──────┘        │
//!     Client Response      │  ┌──────────┐ └──────────────┘                │
//!     ◀────────────────────┼──│dispatcher│◀──────────────────────────────┼──── Backend
//!                          │  └──────────┘                                 │
//!                          └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use weighted_balancer::config::load_config;
use weighted_balancer::lifecycle::signals::spawn_signal_handler;
use weighted_balancer::observability::events::log_events;
use weighted_balancer::observability::{logging, metrics};
use weighted_balancer::{Balancer, Shutdown};

#[derive(Parser)]
#[command(name = "weighted-balancer")]
#[command(about = "Weighted reverse-proxy load balancer", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "balancer.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!("weighted-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.servers.len(),
        monitoring = config.monitoring.enabled,
        interval_ms = config.monitoring.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let balancer = Balancer::new(config)?;
    tokio::spawn(log_events(balancer.subscribe()));

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    balancer.serve(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
