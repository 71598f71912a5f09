//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pool build, prober, dispatcher:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the middleware into dispatcher log lines
//! - Metrics are in-memory only and reset on restart

pub mod logging;
pub mod metrics;
