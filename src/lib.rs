//! Self-contained HTTP load balancer.
//!
//! Requests are scheduled onto a fixed set of backends by either a
//! round-robin or an adaptive (fitness min-heap) strategy, retried on
//! transport errors, and failed over when a backend keeps failing.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::BalancerConfig;
pub use http::{Dispatcher, HttpServer};
pub use lifecycle::Shutdown;
pub use load_balancer::pool::BackendPool;
