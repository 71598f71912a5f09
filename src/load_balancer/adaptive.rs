//! Adaptive load balancing strategy.
//!
//! Backends sit in an array-backed binary min-heap ordered by fitness
//! (see [`Metrics::fitness`](crate::load_balancer::stats::Metrics::fitness)).
//! Fitness is never stored as a key: every comparison made while sifting
//! reads the live counters from the [`MetricsStore`]. Ordering is therefore
//! only guaranteed along the paths an insert or extract touches, which keeps
//! metric updates cheap and needs no re-heapify when counters change.
//!
//! A backend handed out by [`Adaptive::next`] leaves the heap and is only
//! put back when its lease is released, so in-flight backends are not
//! schedulable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::load_balancer::backend::Backend;
use crate::load_balancer::stats::MetricsStore;

fn parent(index: usize) -> usize {
    (index - 1) / 2
}

fn left_child(index: usize) -> usize {
    2 * index + 1
}

fn right_child(index: usize) -> usize {
    2 * index + 2
}

/// Heap storage. The logical size is `slots.len()`.
#[derive(Debug, Default)]
struct Heap {
    slots: Vec<Arc<Backend>>,
}

impl Heap {
    fn less(&self, a: usize, b: usize, stats: &MetricsStore) -> bool {
        stats.fitness(self.slots[a].id) < stats.fitness(self.slots[b].id)
    }

    fn push(&mut self, backend: Arc<Backend>, stats: &MetricsStore) {
        self.slots.push(backend);
        self.sift_up(self.slots.len() - 1, stats);
    }

    fn sift_up(&mut self, mut index: usize, stats: &MetricsStore) {
        while index > 0 {
            let p = parent(index);
            if !self.less(index, p, stats) {
                break;
            }
            self.slots.swap(index, p);
            index = p;
        }
    }

    fn extract_min(&mut self, stats: &MetricsStore) -> Option<Arc<Backend>> {
        if self.slots.is_empty() {
            return None;
        }
        let top = self.slots.swap_remove(0);
        self.sift_down(0, stats);
        Some(top)
    }

    fn sift_down(&mut self, mut index: usize, stats: &MetricsStore) {
        let size = self.slots.len();
        loop {
            let left = left_child(index);
            let right = right_child(index);
            let mut smallest = index;

            if left < size && self.less(left, smallest, stats) {
                smallest = left;
            }
            if right < size && self.less(right, smallest, stats) {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.slots.swap(index, smallest);
            index = smallest;
        }
    }
}

/// Fitness-ordered scheduler.
#[derive(Debug)]
pub struct Adaptive {
    heap: Mutex<Heap>,
    stats: Arc<MetricsStore>,
}

impl Adaptive {
    pub fn new(stats: Arc<MetricsStore>) -> Self {
        Self {
            heap: Mutex::new(Heap::default()),
            stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Metrics backing the fitness comparisons.
    pub fn stats(&self) -> &Arc<MetricsStore> {
        &self.stats
    }

    /// Insert a backend and sift it toward the root.
    pub fn add(&self, backend: Arc<Backend>) {
        self.lock().push(backend, &self.stats);
    }

    /// Backends currently in the heap (excludes in-flight leases).
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the fittest live backend.
    ///
    /// Dead backends pulled off the top along the way are pushed back before
    /// returning, whatever the outcome, so only the returned backend leaves
    /// the heap.
    pub fn next(&self) -> Option<Arc<Backend>> {
        let mut heap = self.lock();
        let mut dead = Vec::new();
        let mut found = None;

        while let Some(backend) = heap.extract_min(&self.stats) {
            if backend.is_alive() {
                found = Some(backend);
                break;
            }
            dead.push(backend);
        }

        for backend in dead {
            heap.push(backend, &self.stats);
        }
        found
    }
}
