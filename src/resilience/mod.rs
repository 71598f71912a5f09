//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transport error from a backend:
//!     → retries.rs (retry same backend after a short pause)
//!     → retries exhausted: backend marked down, request failed over
//!     → attempts exhausted: request rejected with 503
//! ```
//!
//! # Design Decisions
//! - Counters live with the request, not the backend
//! - Failover is a bounded loop, never recursion

pub mod retries;

pub use retries::{NextStep, RetryContext, RetryPolicy};
