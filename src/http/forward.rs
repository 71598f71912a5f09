//! Reverse-proxy transport to a single backend.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the backend's base URL
//! - Strip hop-by-hop headers and append `X-Forwarded-For`
//! - Return the backend response as-is
//!
//! Connection errors surface as [`ForwardError`] so the dispatcher can
//! retry or fail over; HTTP statuses from the backend are passed through.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Uri};
use axum::response::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::http::request::ProxyRequest;
use crate::load_balancer::backend::{ForwardError, Forwarder};

/// Shared HTTP client used by every backend transport.
pub type UpstreamClient = Client<HttpConnector, Body>;

pub fn upstream_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Forwards requests to one backend over a shared hyper client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: UpstreamClient,
    target: Url,
}

impl HttpForwarder {
    pub fn new(client: UpstreamClient, target: Url) -> Self {
        Self { client, target }
    }

    /// Backend URI for a request: backend path and request path joined
    /// with exactly one slash, request query kept.
    pub fn upstream_uri(&self, uri: &Uri) -> Result<Uri, ForwardError> {
        let base = self.target.path();
        let path = uri.path();
        let joined = match (base.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", base, &path[1..]),
            (false, false) => format!("{}/{}", base, path),
            _ => format!("{}{}", base, path),
        };

        let mut target = format!(
            "{}://{}{}",
            self.target.scheme(),
            authority(&self.target),
            joined
        );
        if let Some(query) = uri.query() {
            target.push('?');
            target.push_str(query);
        }
        let uri = Uri::try_from(target).map_err(axum::http::Error::from)?;
        Ok(uri)
    }
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop as well.
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in named.iter().map(String::as_str).chain(HOP_BY_HOP) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, request: &ProxyRequest) {
    let Some(client) = request.client_addr else {
        return;
    };
    let ip = client.ip().to_string();
    let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: &ProxyRequest) -> Result<Response, ForwardError> {
        let uri = self.upstream_uri(&request.uri)?;
        let mut upstream = request.to_upstream(uri)?;
        strip_hop_by_hop(upstream.headers_mut());
        append_forwarded_for(upstream.headers_mut(), request);

        let response: Response<hyper::body::Incoming> = self.client.request(upstream).await?;
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
