//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives → dispatcher asks the pool for a lease
//!     → Scheduler picks a live backend:
//!         - round_robin.rs (rotate through backends)
//!         - adaptive.rs (min-heap over live fitness)
//!     → lease.rs (reservation + metric bookkeeping)
//!     → backend.rs (forward through the backend's transport)
//! ```
//!
//! # Design Decisions
//! - Strategy is chosen once at startup; both variants share one interface
//! - Metrics are addressed by backend index, not by pointer identity
//! - Dead backends are skipped, never evicted

pub mod adaptive;
pub mod backend;
pub mod lease;
pub mod pool;
pub mod round_robin;
pub mod stats;

use std::sync::Arc;

use crate::config::SchedulingMode;
use crate::load_balancer::{
    adaptive::Adaptive, backend::Backend, lease::Lease, round_robin::RoundRobin,
    stats::MetricsStore,
};

/// The scheduling strategy of a pool, with its private state.
#[derive(Debug)]
pub enum Scheduler {
    RoundRobin(RoundRobin),
    Adaptive(Arc<Adaptive>),
}

impl Scheduler {
    pub fn new(mode: SchedulingMode, stats: Arc<MetricsStore>) -> Self {
        match mode {
            SchedulingMode::RoundRobin => Scheduler::RoundRobin(RoundRobin::new()),
            SchedulingMode::Adaptive => Scheduler::Adaptive(Arc::new(Adaptive::new(stats))),
        }
    }

    pub fn mode(&self) -> SchedulingMode {
        match self {
            Scheduler::RoundRobin(_) => SchedulingMode::RoundRobin,
            Scheduler::Adaptive(_) => SchedulingMode::Adaptive,
        }
    }

    /// Install a backend into the strategy's structure.
    pub fn add(&mut self, backend: Arc<Backend>) {
        match self {
            Scheduler::RoundRobin(rr) => rr.add(backend),
            Scheduler::Adaptive(heap) => heap.add(backend),
        }
    }

    /// Select the next live backend, if any.
    pub fn next(&self) -> Option<Lease> {
        match self {
            Scheduler::RoundRobin(rr) => rr.next().map(Lease::shared),
            Scheduler::Adaptive(heap) => heap.next().map(|b| Lease::reserved(b, heap.clone())),
        }
    }

    /// Backends currently schedulable (adaptive excludes in-flight leases).
    pub fn len(&self) -> usize {
        match self {
            Scheduler::RoundRobin(rr) => rr.len(),
            Scheduler::Adaptive(heap) => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
