//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active checks (active.rs):
//!     Periodic timer (default 2 min)
//!     → TCP connect to each backend (default 2 s timeout)
//!     → alive = connected
//!
//! Passive marking (http::dispatcher):
//!     Transport retries exhausted
//!     → alive = false until the next successful probe
//! ```
//!
//! # Design Decisions
//! - No thresholds: one probe result decides liveness
//! - The loop stops on the shutdown broadcast

pub mod active;
