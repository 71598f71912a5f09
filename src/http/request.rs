//! Request handling and transformation.
//!
//! # Responsibilities
//! - Buffer the inbound request so it can be replayed on retry and failover
//! - Carry the client address and request ID for logging
//! - Build the outbound request for a given backend URI
//!
//! # Design Decisions
//! - Bodies are read fully, bounded by `listener.max_body_bytes`
//! - Request ID is generated by the middleware stack as early as possible

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Uri, Version};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Error reading the inbound body.
#[derive(Debug, thiserror::Error)]
#[error("failed to buffer request body: {0}")]
pub struct BodyError(#[from] axum::Error);

/// A fully buffered, replayable inbound request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl ProxyRequest {
    /// Buffer an axum request, reading at most `limit` body bytes.
    pub async fn buffer(
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        limit: usize,
    ) -> Result<Self, BodyError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    /// Path for log lines.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn request_id(&self) -> &str {
        self.headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }

    /// Client address for log lines.
    pub fn client(&self) -> String {
        self.client_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Outbound request with the same method, headers and body, aimed at `uri`.
    pub fn to_upstream(&self, uri: Uri) -> Result<Request<Body>, axum::http::Error> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .version(self.version);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder.body(Body::from(self.body.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_and_replay() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit?x=1")
            .header(X_REQUEST_ID, "abc")
            .body(Body::from("payload"))
            .unwrap();

        let buffered = ProxyRequest::buffer(request, None, 1024).await.unwrap();
        assert_eq!(buffered.path(), "/submit");
        assert_eq!(buffered.request_id(), "abc");
        assert_eq!(buffered.client(), "unknown");

        for _ in 0..2 {
            let upstream = buffered
                .to_upstream("http://127.0.0.1:9001/submit?x=1".parse().unwrap())
                .unwrap();
            assert_eq!(upstream.method(), Method::POST);
            assert_eq!(upstream.headers()[X_REQUEST_ID], "abc");
            let body = axum::body::to_bytes(upstream.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], b"payload");
        }
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .uri("/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        assert!(ProxyRequest::buffer(request, None, 16).await.is_err());
    }
}
