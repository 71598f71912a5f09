//! Live per-backend performance counters.
//!
//! # Locking
//! - The store lock (`RwLock`) guards the shape of the record arena. It is
//!   taken for write only when a backend is registered.
//! - Each record sits behind its own `Mutex`, the per-backend lock, which is
//!   held across a single read-modify-write.
//!
//! Order is always store lock, then record lock. Callers that also hold the
//! adaptive heap lock take it first.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use crate::load_balancer::backend::BackendId;

const ACTIVE_WEIGHT: f64 = 0.35;
const RESPONSE_TIME_WEIGHT: f64 = 0.35;
const COMPLETED_WEIGHT: f64 = 0.30;

/// Counters for one backend. All fields start at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    /// Requests currently assigned to the backend.
    pub active_connections: f64,
    /// Running mean of observed latency, in nanoseconds.
    /// Only meaningful once `completed_count >= 1`.
    pub mean_response_time: f64,
    /// Requests completed so far; the weight of the running mean.
    pub completed_count: f64,
}

impl Metrics {
    /// Weighted score, lower is more available.
    pub fn fitness(&self) -> f64 {
        ACTIVE_WEIGHT * self.active_connections
            + RESPONSE_TIME_WEIGHT * self.mean_response_time
            + COMPLETED_WEIGHT * self.completed_count
    }

    /// Mean after folding in one more observation of `elapsed_ns`.
    pub fn next_mean(&self, elapsed_ns: f64) -> f64 {
        (self.completed_count * self.mean_response_time + elapsed_ns) / (self.completed_count + 1.0)
    }
}

/// Arena of [`Metrics`] records indexed by [`BackendId`].
#[derive(Debug, Default)]
pub struct MetricsStore {
    records: RwLock<Vec<Mutex<Metrics>>>,
}

fn lock_record(record: &Mutex<Metrics>) -> MutexGuard<'_, Metrics> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed record and return its index.
    pub fn register(&self) -> BackendId {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push(Mutex::new(Metrics::default()));
        BackendId(records.len() - 1)
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current counters. Unknown ids read as zero.
    pub fn snapshot(&self, id: BackendId) -> Metrics {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(id.0).map(|r| *lock_record(r)).unwrap_or_default()
    }

    /// Fitness recomputed from the live counters.
    pub fn fitness(&self, id: BackendId) -> f64 {
        self.snapshot(id).fitness()
    }

    /// Read-modify-write one record under its own lock.
    pub fn update<R>(&self, id: BackendId, f: impl FnOnce(&mut Metrics) -> R) -> Option<R> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(id.0).map(|r| {
            let mut metrics = lock_record(r);
            f(&mut *metrics)
        })
    }

    pub fn set_active_connections(&self, id: BackendId, value: f64) {
        self.update(id, |m| m.active_connections = value);
    }

    pub fn set_mean_response_time(&self, id: BackendId, value: f64) {
        self.update(id, |m| m.mean_response_time = value);
    }

    pub fn set_completed_count(&self, id: BackendId, value: f64) {
        self.update(id, |m| m.completed_count = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitness_weights() {
        let m = Metrics {
            active_connections: 1.0,
            mean_response_time: 2.0,
            completed_count: 10.0,
        };
        assert!((m.fitness() - (0.35 + 0.70 + 3.0)).abs() < 1e-9);
        assert_eq!(Metrics::default().fitness(), 0.0);
    }

    #[test]
    fn test_fitness_monotonic_in_each_input() {
        let base = Metrics {
            active_connections: 3.0,
            mean_response_time: 1_500.0,
            completed_count: 7.0,
        };
        for step in [0.0, 0.5, 1.0, 100.0] {
            let mut m = base;
            m.active_connections += step;
            assert!(m.fitness() >= base.fitness());

            let mut m = base;
            m.mean_response_time += step;
            assert!(m.fitness() >= base.fitness());

            let mut m = base;
            m.completed_count += step;
            assert!(m.fitness() >= base.fitness());
        }
    }

    #[test]
    fn test_next_mean() {
        let fresh = Metrics::default();
        assert_eq!(fresh.next_mean(400.0), 400.0);

        let m = Metrics {
            active_connections: 0.0,
            mean_response_time: 100.0,
            completed_count: 3.0,
        };
        assert!((m.next_mean(500.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_store_register_and_update() {
        let store = MetricsStore::new();
        assert!(store.is_empty());
        let a = store.register();
        let b = store.register();
        assert_eq!(a, BackendId(0));
        assert_eq!(b, BackendId(1));

        store.set_active_connections(b, 2.0);
        store.set_completed_count(b, 4.0);
        store.set_mean_response_time(b, 10.0);
        assert_eq!(store.snapshot(a), Metrics::default());
        assert_eq!(store.snapshot(b).completed_count, 4.0);
        assert!((store.fitness(b) - (0.7 + 3.5 + 1.2)).abs() < 1e-9);

        assert_eq!(store.update(BackendId(9), |m| m.completed_count), None);
        assert_eq!(store.fitness(BackendId(9)), 0.0);
    }
}
