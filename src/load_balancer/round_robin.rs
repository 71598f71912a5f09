//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Round-robin selector.
/// Cycles through backends in insertion order, skipping dead ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, backend: Arc<Backend>) {
        self.backends.push(backend);
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Advance the cursor and return its new slot.
    fn next_index(&self) -> usize {
        self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % self.backends.len()
    }

    /// Next live backend, scanning at most one full cycle.
    pub fn next(&self) -> Option<Arc<Backend>> {
        if self.backends.is_empty() {
            return None;
        }

        let len = self.backends.len();
        let next = self.next_index();

        for i in next..next + len {
            let index = i % len;
            let backend = &self.backends[index];
            if backend.is_alive() {
                if i != next {
                    // Resume after the backend we skipped to.
                    self.current.store(index, Ordering::Relaxed);
                }
                return Some(backend.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::testing::backend;
    use std::collections::HashSet;

    fn pool(n: usize) -> RoundRobin {
        let mut rr = RoundRobin::new();
        for i in 0..n {
            rr.add(backend(i, &format!("127.0.0.1:{}", 9000 + i)));
        }
        rr
    }

    #[test]
    fn test_round_robin() {
        let rr = pool(3);
        let picks: Vec<_> = (0..6).map(|_| rr.next().unwrap().id.0).collect();
        // The cursor is pre-incremented, so the first pick is slot 1.
        assert_eq!(picks, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_visits_every_live_backend_within_a_cycle() {
        for n in 1..6 {
            let rr = pool(n);
            rr.backends[n / 2].set_alive(false);
            let live = rr.backends.iter().filter(|b| b.is_alive()).count();

            let seen: HashSet<_> = (0..n).filter_map(|_| rr.next()).map(|b| b.id).collect();
            assert_eq!(seen.len(), live, "pool size {}", n);
            assert!(!seen.contains(&rr.backends[n / 2].id));
        }
    }

    #[test]
    fn test_skips_dead_and_moves_cursor() {
        let rr = pool(4);
        rr.backends[1].set_alive(false);
        rr.backends[2].set_alive(false);

        // Slot 1 is next; 1 and 2 are dead, so slot 3 is served and the cursor jumps there.
        assert_eq!(rr.next().unwrap().id.0, 3);
        assert_eq!(rr.next().unwrap().id.0, 0);
        assert_eq!(rr.next().unwrap().id.0, 3);
    }

    #[test]
    fn test_all_dead_or_empty() {
        assert!(RoundRobin::new().next().is_none());

        let rr = pool(3);
        for b in &rr.backends {
            b.set_alive(false);
        }
        assert!(rr.next().is_none());

        rr.backends[0].set_alive(true);
        assert_eq!(rr.next().unwrap().id.0, 0);
    }
}
