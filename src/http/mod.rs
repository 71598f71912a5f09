//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (buffer into a replayable request)
//!     → dispatcher.rs (schedule, forward, retry, fail over)
//!     → forward.rs (hyper client to the chosen backend)
//!     → backend response, or response.rs 503
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use request::{ProxyRequest, X_REQUEST_ID};
pub use server::HttpServer;
