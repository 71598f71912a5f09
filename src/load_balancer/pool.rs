//! Backend pool management.
//!
//! # Responsibilities
//! - Turn configured addresses into backends (pool builder)
//! - Register each backend's metrics record and install it in the scheduler
//! - Hand out leases for dispatch
//! - Start the background prober over the pool

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{HealthCheckConfig, SchedulingMode};
use crate::health::active::HealthMonitor;
use crate::load_balancer::{
    backend::{parse_address, AddressError, Backend, Forwarder},
    lease::Lease,
    stats::MetricsStore,
    Scheduler,
};

/// Error building a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no backends configured, provide one or more backends to load balance")]
    Empty,

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("duplicate backend address {0}")]
    Duplicate(Url),
}

/// A fixed set of backends behind one scheduling strategy.
#[derive(Debug)]
pub struct BackendPool {
    /// Every backend, in configuration order. Index == `BackendId`.
    backends: Vec<Arc<Backend>>,
    stats: Arc<MetricsStore>,
    scheduler: Scheduler,
}

impl BackendPool {
    /// Create an empty pool.
    pub fn new(mode: SchedulingMode) -> Self {
        let stats = Arc::new(MetricsStore::new());
        Self {
            backends: Vec::new(),
            scheduler: Scheduler::new(mode, stats.clone()),
            stats,
        }
    }

    /// Build a pool from raw addresses, creating each backend's transport
    /// with `make_forwarder`. An empty list is an error.
    pub fn build<S, F>(addresses: &[S], mode: SchedulingMode, mut make_forwarder: F) -> Result<Self, PoolError>
    where
        S: AsRef<str>,
        F: FnMut(&Url) -> Arc<dyn Forwarder>,
    {
        if addresses.is_empty() {
            return Err(PoolError::Empty);
        }

        let mut pool = Self::new(mode);
        for raw in addresses {
            let address = parse_address(raw.as_ref())?;
            let forwarder = make_forwarder(&address);
            pool.add_backend(address, forwarder)?;
        }
        Ok(pool)
    }

    /// Register a backend and install it in the scheduler. Starts alive.
    pub fn add_backend(&mut self, address: Url, forwarder: Arc<dyn Forwarder>) -> Result<Arc<Backend>, PoolError> {
        if self.find(&address).is_some() {
            return Err(PoolError::Duplicate(address));
        }

        let id = self.stats.register();
        let backend = Arc::new(Backend::new(id, address, forwarder));
        self.backends.push(backend.clone());
        self.scheduler.add(backend.clone());

        tracing::info!(id = %id, address = %backend.address, "Configured backend");
        Ok(backend)
    }

    /// Lease the next backend according to the strategy.
    pub fn next(&self) -> Option<Lease> {
        let lease = self.scheduler.next();
        if lease.is_none() {
            tracing::debug!(
                mode = %self.mode(),
                backend_count = self.backends.len(),
                "No live backend available"
            );
        }
        lease
    }

    pub fn mode(&self) -> SchedulingMode {
        self.scheduler.mode()
    }

    /// All backends, live or not.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn stats(&self) -> &Arc<MetricsStore> {
        &self.stats
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Look up a backend by address.
    pub fn find(&self, address: &Url) -> Option<&Arc<Backend>> {
        self.backends.iter().find(|b| &b.address == address)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Spawn the periodic prober over every backend in the pool.
    pub fn start_health_loop(
        &self,
        config: HealthCheckConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let monitor = HealthMonitor::new(self.backends.clone(), config);
        tokio::spawn(monitor.run(shutdown))
    }
}
