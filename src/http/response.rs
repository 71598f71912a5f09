//! Synthetic responses.
//!
//! Backend responses are passed through untouched; the only response the
//! balancer produces itself is the 503 sent when no backend can serve.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub const UNAVAILABLE_BODY: &str = "Service not available";

/// Plain-text 503 returned on rejection, pool exhaustion or an unreadable body.
pub fn service_unavailable() -> Response {
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, format!("{}\n", UNAVAILABLE_BODY)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}
