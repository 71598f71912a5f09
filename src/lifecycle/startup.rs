//! Startup orchestration.
//!
//! Order: metrics exporter, backend pool (fatal if empty), listener,
//! signal watcher, then serve until shutdown.

use tokio::net::TcpListener;

use crate::config::BalancerConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals::shutdown_signal, Shutdown};
use crate::load_balancer::pool::PoolError;
use crate::observability::metrics;

/// Error that aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build backend pool: {0}")]
    Pool(#[from] PoolError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start every subsystem and serve until a shutdown signal arrives.
pub async fn start(config: BalancerConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address();
    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(&bind_address).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;
    Ok(())
}
