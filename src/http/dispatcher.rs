//! Per-request dispatch.
//!
//! # State machine
//! ```text
//! START ──attempts > max──────────────────────────▶ REJECTED (503)
//!   │
//!   ▼
//! pool.next() ──none──────────────────────────────▶ REJECTED (503)
//!   │
//!   ▼
//! forward ──ok──▶ record metrics, release ────────▶ SERVED
//!   │
//!   └─transport error─▶ retries < max: wait, forward again (same backend)
//!                       retries = max: mark backend down, attempts += 1, START
//! ```
//!
//! Failover is a loop bounded by the attempt budget, never recursion.

use std::sync::Arc;
use std::time::Instant;

use axum::response::Response;

use crate::http::request::ProxyRequest;
use crate::http::response::service_unavailable;
use crate::load_balancer::backend::{Backend, ForwardError};
use crate::load_balancer::pool::BackendPool;
use crate::observability::metrics;
use crate::resilience::{NextStep, RetryContext, RetryPolicy};

/// Drives one request through scheduling, forwarding and failover.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<BackendPool>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(pool: Arc<BackendPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Serve `request` from some live backend, or answer 503.
    ///
    /// The lease is completed once the backend's response head arrives, so
    /// `mean_response_time` measures time to headers and the backend is back
    /// in the adaptive heap while its body is still streaming to the client.
    pub async fn dispatch(&self, request: &ProxyRequest) -> Response {
        let started = Instant::now();
        let mut ctx = RetryContext::new();

        loop {
            if ctx.exhausted(&self.policy) {
                tracing::warn!(
                    request_id = %request.request_id(),
                    client = %request.client(),
                    path = %request.path(),
                    attempts = ctx.attempts,
                    "Max attempts reached, terminating"
                );
                metrics::record_request("rejected", started);
                return service_unavailable();
            }

            let Some(mut lease) = self.pool.next() else {
                tracing::warn!(
                    request_id = %request.request_id(),
                    client = %request.client(),
                    path = %request.path(),
                    mode = %self.pool.mode(),
                    "No live backend available"
                );
                metrics::record_request("rejected", started);
                return service_unavailable();
            };

            lease.begin();
            ctx.start_backend();

            let outcome = self.forward_with_retries(lease.backend(), request, &mut ctx).await;
            match outcome {
                Ok(response) => {
                    lease.complete();
                    metrics::record_request("served", started);
                    return response;
                }
                Err(error) => {
                    let authority = lease.authority();
                    if lease.set_alive(false) {
                        tracing::warn!(backend = %authority, error = %error, "{} [down]", lease.address);
                    }
                    metrics::record_backend_health(&authority, false);
                    metrics::record_failover(&authority);

                    tracing::warn!(
                        request_id = %request.request_id(),
                        client = %request.client(),
                        path = %request.path(),
                        attempt = ctx.attempts,
                        "Attempting retry"
                    );
                    ctx.fail_over();
                }
            }
        }
    }

    /// Forward to one backend, retrying transport errors in place.
    async fn forward_with_retries(
        &self,
        backend: &Backend,
        request: &ProxyRequest,
        ctx: &mut RetryContext,
    ) -> Result<Response, ForwardError> {
        loop {
            let error = match backend.forward(request).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            tracing::warn!(
                request_id = %request.request_id(),
                backend = %backend.authority(),
                retry = ctx.retries,
                error = %error,
                "Upstream transport error"
            );

            match ctx.record_failure(&self.policy) {
                NextStep::RetrySameBackend => {
                    metrics::record_retry(&backend.authority());
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                NextStep::Failover => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingMode;
    use crate::load_balancer::backend::{parse_address, Forwarder};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, StatusCode};
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls, then answers 200 with its name.
    #[derive(Debug)]
    struct Scripted {
        name: &'static str,
        failures: usize,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(name: &'static str) -> Arc<Self> {
            Self::new(name, 0, Duration::ZERO)
        }

        fn down(name: &'static str) -> Arc<Self> {
            Self::new(name, usize::MAX, Duration::ZERO)
        }

        fn new(name: &'static str, failures: usize, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Forwarder for Scripted {
        async fn forward(&self, _request: &ProxyRequest) -> Result<Response, ForwardError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ForwardError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            tokio::time::sleep(self.delay).await;
            Ok((StatusCode::OK, self.name).into_response())
        }
    }

    fn request() -> ProxyRequest {
        ProxyRequest {
            method: Method::GET,
            uri: "/".parse().unwrap(),
            version: Default::default(),
            headers: HeaderMap::new(),
            body: Default::default(),
            client_addr: Some("127.0.0.1:40000".parse().unwrap()),
        }
    }

    fn dispatcher(mode: SchedulingMode, forwarders: &[Arc<Scripted>]) -> Dispatcher {
        let mut pool = BackendPool::new(mode);
        for (i, f) in forwarders.iter().enumerate() {
            let url = parse_address(&format!("127.0.0.1:{}", 9400 + i)).unwrap();
            pool.add_backend(url, f.clone()).unwrap();
        }
        Dispatcher::new(Arc::new(pool), RetryPolicy::default())
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_adaptive_success_updates_metrics() {
        let f = Scripted::new("a", 0, Duration::from_millis(5));
        let d = dispatcher(SchedulingMode::Adaptive, &[f.clone()]);
        let id = d.pool().backends()[0].id;
        d.pool().stats().update(id, |m| {
            m.mean_response_time = 1_000.0;
            m.completed_count = 2.0;
        });

        let started = Instant::now();
        let response = d.dispatch(&request()).await;
        let total_ns = started.elapsed().as_nanos() as f64;
        assert_eq!(response.status(), StatusCode::OK);

        let m = d.pool().stats().snapshot(id);
        assert_eq!(m.completed_count, 3.0);
        assert_eq!(m.active_connections, 0.0);
        // mean = (2 * 1000 + elapsed) / 3
        let elapsed = m.mean_response_time * 3.0 - 2_000.0;
        assert!(elapsed >= 5_000_000.0 - 1.0, "elapsed {}", elapsed);
        assert!(elapsed <= total_ns + 1.0, "elapsed {} > {}", elapsed, total_ns);
        assert_eq!(d.pool().scheduler().len(), 1);
    }

    #[tokio::test]
    async fn test_round_robin_success_skips_bookkeeping() {
        let f = Scripted::ok("a");
        let d = dispatcher(SchedulingMode::RoundRobin, &[f.clone()]);
        let response = d.dispatch(&request()).await;
        assert_eq!(body(response).await, "a");
        assert_eq!(d.pool().stats().snapshot(d.pool().backends()[0].id).completed_count, 0.0);
    }

    #[tokio::test]
    async fn test_transient_errors_retry_same_backend() {
        let flaky = Scripted::new("flaky", 2, Duration::ZERO);
        let d = dispatcher(SchedulingMode::RoundRobin, &[flaky.clone()]);
        let response = d.dispatch(&request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(flaky.calls(), 3);
        assert!(d.pool().backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_three_failures_fail_over() {
        // Round-robin starts at slot 1, so the dead backend goes there.
        let healthy = Scripted::ok("healthy");
        let broken = Scripted::down("broken");
        let d = dispatcher(SchedulingMode::RoundRobin, &[healthy.clone(), broken.clone()]);

        let response = d.dispatch(&request()).await;
        assert_eq!(body(response).await, "healthy");
        assert_eq!(broken.calls(), 3);
        assert_eq!(healthy.calls(), 1);
        assert!(!d.pool().backends()[1].is_alive());
        assert!(d.pool().backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_adaptive_failover_keeps_pool_intact() {
        let broken = Scripted::down("broken");
        let healthy = Scripted::ok("healthy");
        let d = dispatcher(SchedulingMode::Adaptive, &[broken.clone(), healthy.clone()]);

        let response = d.dispatch(&request()).await;
        assert_eq!(body(response).await, "healthy");
        assert_eq!(broken.calls(), 3);
        assert_eq!(d.pool().scheduler().len(), 2);

        let stats = d.pool().stats();
        let broken_id = d.pool().backends()[0].id;
        let healthy_id = d.pool().backends()[1].id;
        assert_eq!(stats.snapshot(broken_id).completed_count, 0.0);
        assert_eq!(stats.snapshot(broken_id).active_connections, 0.0);
        assert_eq!(stats.snapshot(healthy_id).completed_count, 1.0);
    }

    #[tokio::test]
    async fn test_rejects_after_max_attempts() {
        let forwarders: Vec<_> = (0..4).map(|_| Scripted::down("x")).collect();
        for mode in [SchedulingMode::RoundRobin, SchedulingMode::Adaptive] {
            let d = dispatcher(mode, &forwarders);
            for f in &forwarders {
                f.calls.store(0, Ordering::SeqCst);
            }

            let response = d.dispatch(&request()).await;
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body(response).await, "Service not available\n");

            // Three attempts of three tries each; the fourth backend is never scheduled.
            let calls: Vec<_> = forwarders.iter().map(|f| f.calls()).collect();
            assert_eq!(calls.iter().sum::<usize>(), 9, "{:?}", calls);
            assert_eq!(calls.iter().filter(|&&c| c == 0).count(), 1);
            assert_eq!(d.pool().backends().iter().filter(|b| b.is_alive()).count(), 1);
            assert_eq!(d.pool().scheduler().len(), 4);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adaptive_dispatch_loses_no_backend() {
        let forwarders: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| Scripted::new(name, 0, Duration::from_millis(20)))
            .collect();
        let d = dispatcher(SchedulingMode::Adaptive, &forwarders);

        let handles: Vec<_> = (0..48)
            .map(|_| {
                let d = d.clone();
                tokio::spawn(async move { d.dispatch(&request()).await.status() })
            })
            .collect();

        // Abandon every third request while its backend is leased.
        tokio::time::sleep(Duration::from_millis(5)).await;
        for handle in handles.iter().step_by(3) {
            handle.abort();
        }

        let mut served = 0.0;
        for handle in handles {
            if let Ok(status) = handle.await {
                assert!(
                    status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
                    "unexpected status {}",
                    status
                );
                if status == StatusCode::OK {
                    served += 1.0;
                }
            }
        }

        let pool = d.pool();
        assert_eq!(pool.scheduler().len(), pool.len());
        let completed: f64 = pool
            .backends()
            .iter()
            .map(|b| pool.stats().snapshot(b.id).completed_count)
            .sum();
        assert_eq!(completed, served);
        for b in pool.backends() {
            assert_eq!(pool.stats().snapshot(b.id).active_connections, 0.0, "{}", b.address);
        }
    }

    #[tokio::test]
    async fn test_dead_single_backend_is_unavailable() {
        for mode in [SchedulingMode::RoundRobin, SchedulingMode::Adaptive] {
            let f = Scripted::ok("a");
            let d = dispatcher(mode, &[f.clone()]);
            d.pool().backends()[0].set_alive(false);

            let response = d.dispatch(&request()).await;
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(f.calls(), 0);
        }
    }
}
