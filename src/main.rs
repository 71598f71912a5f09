//! Adaptive load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                    LOAD BALANCER                      │
//!                    │                                                       │
//!  Client Request    │  ┌─────────┐    ┌────────────┐    ┌───────────────┐   │
//!  ──────────────────┼─▶│  http   │───▶│ dispatcher │───▶│ load_balancer │   │
//!                    │  │ server  │    │  (retries) │    │  scheduler    │   │
//!                    │  └─────────┘    └─────┬──────┘    └───────┬───────┘   │
//!                    │                       │                   │ lease     │
//!                    │                       ▼                   ▼           │
//!  Client Response   │                ┌────────────┐    ┌───────────────┐   │
//!  ◀─────────────────┼────────────────│  forward   │◀───│    backend    │◀──┼── Backend
//!                    │                └────────────┘    └───────────────┘   │
//!                    │                                                       │
//!                    │  ┌──────────┐ ┌────────┐ ┌──────────────┐ ┌─────────┐  │
//!                    │  │  config  │ │ health │ │observability │ │lifecycle│  │
//!                    │  └──────────┘ └────────┘ └──────────────┘ └─────────┘  │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use adaptive_lb::config::{load_config, validation::validate_config, ConfigError, SchedulingMode};
use adaptive_lb::lifecycle::startup;
use adaptive_lb::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "adaptive-lb")]
#[command(about = "HTTP load balancer with round-robin and adaptive scheduling", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen port, overriding the file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Scheduling mode (round_robin|RR, adaptive|A), overriding the file.
    #[arg(short, long)]
    mode: Option<SchedulingMode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }

    init_logging(&config.observability.log_level);

    if let Err(errors) = validate_config(&config) {
        let e = ConfigError::Validation(errors);
        tracing::error!(error = %e, "Invalid command line overrides");
        return Err(e.into());
    }

    tracing::info!("adaptive-lb v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        mode = %config.mode,
        backends = config.backends.len(),
        "Configuration loaded"
    );

    startup::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
