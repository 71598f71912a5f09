//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track liveness (flipped by the prober and by failover)
//! - Carry the forwarding capability used by the dispatcher
//!
//! Backends live for the process lifetime. Equality is by address, and
//! each backend owns a stable [`BackendId`] that indexes its metrics record.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use url::Url;

use crate::http::request::ProxyRequest;

/// Stable arena index of a backend inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(pub usize);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned by a [`Forwarder`] when the backend could not be reached.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream request: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("upstream i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends one request to one backend.
///
/// Implementations return the raw backend response, or a [`ForwardError`]
/// for transport-level failures. HTTP error statuses are responses, not errors.
#[async_trait]
pub trait Forwarder: Send + Sync + fmt::Debug {
    async fn forward(&self, request: &ProxyRequest) -> Result<Response, ForwardError>;
}

/// Error for addresses that cannot be turned into a backend URL.
#[derive(Debug, thiserror::Error)]
#[error("invalid backend address {address:?}: {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

/// Parse a backend address. Bare `host:port` gets an `http://` scheme.
pub fn parse_address(raw: &str) -> Result<Url, AddressError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&candidate).map_err(|e| AddressError {
        address: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.host_str().is_none() {
        return Err(AddressError {
            address: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    if url.port_or_known_default().is_none() {
        return Err(AddressError {
            address: raw.to_string(),
            reason: "missing port".to_string(),
        });
    }
    Ok(url)
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Index of this backend's metrics record.
    pub id: BackendId,
    /// Where requests go. Immutable after creation.
    pub address: Url,
    alive: AtomicBool,
    forwarder: Arc<dyn Forwarder>,
}

impl Backend {
    /// Create a new backend, alive by default.
    pub fn new(id: BackendId, address: Url, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            id,
            address,
            alive: AtomicBool::new(true),
            forwarder,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Set liveness, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// `host:port` of the backend, used for probing and log labels.
    pub fn authority(&self) -> String {
        let host = self.address.host_str().unwrap_or_default();
        match self.address.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Forward one request through this backend's transport.
    pub async fn forward(&self, request: &ProxyRequest) -> Result<Response, ForwardError> {
        self.forwarder.forward(request).await
    }
}

impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Backend {}
