//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends with a bare TCP connect
//! - Update backend liveness based on results
//!
//! This is the only path that brings a backend back after failover
//! marked it down.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::Backend;
use crate::observability::metrics;

pub struct HealthMonitor {
    backends: Vec<Arc<Backend>>,
    interval: Duration,
    timeout: Duration,
    enabled: bool,
}

impl HealthMonitor {
    pub fn new(backends: Vec<Arc<Backend>>, config: HealthCheckConfig) -> Self {
        Self {
            backends,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            enabled: config.enabled,
        }
    }

    /// Override the probe period and connect timeout.
    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    /// Probe every period until `shutdown` fires. The first sweep runs one
    /// period after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            backends = self.backends.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("Starting health check");
                    self.check_all().await;
                    tracing::info!("Health check completed");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One sweep over the pool. A failing backend never stops the sweep.
    pub async fn check_all(&self) {
        for backend in &self.backends {
            let alive = self.probe(backend).await;
            let was_alive = backend.set_alive(alive);

            if alive {
                tracing::info!(changed = !was_alive, "{} [up]", backend.address);
            } else {
                tracing::warn!(changed = was_alive, "{} [down]", backend.address);
            }
            metrics::record_backend_health(&backend.authority(), alive);
        }
    }

    async fn probe(&self, backend: &Backend) -> bool {
        let authority = backend.authority();
        match time::timeout(self.timeout, TcpStream::connect(authority.as_str())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::warn!(addr = %authority, error = %e, "Backend unreachable");
                false
            }
            Err(_) => {
                tracing::warn!(addr = %authority, "Backend probe timed out");
                false
            }
        }
    }
}
