//! In-flight reservation of a backend.
//!
//! A [`Lease`] is what the scheduler hands to the dispatcher. For the
//! adaptive strategy it also carries the metric bookkeeping for the request
//! and puts the backend back into the heap when dropped, even if the request
//! future is abandoned half-way.

use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::load_balancer::adaptive::Adaptive;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::stats::Metrics;

#[derive(Debug)]
struct Reservation {
    home: Arc<Adaptive>,
    /// Counters as read before the request was started.
    before: Option<Metrics>,
    started: Instant,
    settled: bool,
}

/// A backend selected for one request.
#[derive(Debug)]
pub struct Lease {
    backend: Arc<Backend>,
    reservation: Option<Reservation>,
}

impl Lease {
    /// Lease that needs no release (round-robin).
    pub(crate) fn shared(backend: Arc<Backend>) -> Self {
        Self {
            backend,
            reservation: None,
        }
    }

    /// Lease on a backend that was removed from an adaptive heap.
    pub(crate) fn reserved(backend: Arc<Backend>, home: Arc<Adaptive>) -> Self {
        Self {
            backend,
            reservation: Some(Reservation {
                home,
                before: None,
                started: Instant::now(),
                settled: false,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Count the request against the backend and start its clock.
    pub fn begin(&mut self) {
        let id = self.backend.id;
        if let Some(r) = self.reservation.as_mut() {
            r.before = r.home.stats().update(id, |m| {
                let before = *m;
                m.active_connections += 1.0;
                before
            });
            r.started = Instant::now();
        }
    }

    /// Record a served request and release the backend.
    ///
    /// The running mean is weighted by the completed count read in
    /// [`begin`](Self::begin), and `active_connections` is written back to
    /// that same snapshot rather than decremented.
    pub fn complete(mut self) -> Option<Duration> {
        let id = self.backend.id;
        let r = self.reservation.as_mut()?;
        let before = r.before?;
        let elapsed = r.started.elapsed();

        r.home.stats().update(id, |m| {
            m.completed_count = before.completed_count + 1.0;
            m.mean_response_time = before.next_mean(elapsed.as_nanos() as f64);
            m.active_connections = before.active_connections;
        });
        r.settled = true;
        Some(elapsed)
    }
}

impl Deref for Lease {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(r) = self.reservation.take() {
            if let (false, Some(before)) = (r.settled, r.before) {
                r.home.stats().update(self.backend.id, |m| {
                    m.active_connections = before.active_connections;
                });
            }
            r.home.add(self.backend.clone());
        }
    }
}
