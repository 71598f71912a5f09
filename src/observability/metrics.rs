//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by outcome (served, rejected)
//! - `lb_request_duration_seconds` (histogram): end-to-end dispatch latency
//! - `lb_backend_retries_total` (counter): same-backend retries by backend
//! - `lb_failovers_total` (counter): backends marked down by failover
//! - `lb_backend_up` (gauge): 1=alive, 0=down
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, started: Instant) {
    metrics::counter!("lb_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("lb_request_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_retry(backend: &str) {
    metrics::counter!("lb_backend_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_failover(backend: &str) {
    metrics::counter!("lb_failovers_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_health(backend: &str, up: bool) {
    metrics::gauge!("lb_backend_up", "backend" => backend.to_string()).set(if up { 1.0 } else { 0.0 });
}
