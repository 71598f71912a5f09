//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Buffer each request and hand it to the dispatcher
//! - Start the health monitor alongside the server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::Url;

use crate::config::BalancerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::forward::{upstream_client, HttpForwarder};
use crate::http::request::ProxyRequest;
use crate::http::response::service_unavailable;
use crate::lifecycle::Shutdown;
use crate::load_balancer::backend::Forwarder;
use crate::load_balancer::pool::{BackendPool, PoolError};
use crate::resilience::RetryPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_body_bytes: usize,
}

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    /// Build the backend pool from configuration and the server around it.
    pub fn new(config: BalancerConfig) -> Result<Self, PoolError> {
        let client = upstream_client();
        let pool = BackendPool::build(
            &config.backend_addresses(),
            config.mode,
            |url: &Url| -> Arc<dyn Forwarder> { Arc::new(HttpForwarder::new(client.clone(), url.clone())) },
        )?;
        Ok(Self::with_pool(config, Arc::new(pool)))
    }

    /// Build the server around an existing pool.
    pub fn with_pool(config: BalancerConfig, pool: Arc<BackendPool>) -> Self {
        let state = AppState {
            dispatcher: Dispatcher::new(pool.clone(), RetryPolicy::from(&config.retries)),
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Load balancer started");
        tracing::info!(mode = %self.pool.mode(), backends = self.pool.len(), "Configuration mode");

        let health = self.config.health_check.enabled.then(|| {
            self.pool
                .start_health_loop(self.config.health_check.clone(), shutdown.subscribe())
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        if let Some(handle) = health {
            let _ = handle.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}

/// Catch-all handler: buffer, then dispatch.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    handle(&state, client, request).await
}

async fn handle(state: &AppState, client: SocketAddr, request: Request<Body>) -> Response {
    // A body that cannot be replayed is never scheduled.
    let request = match ProxyRequest::buffer(request, Some(client), state.max_body_bytes).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(
                client = %client,
                limit = state.max_body_bytes,
                error = %e,
                "Rejecting request body"
            );
            return service_unavailable();
        }
    };

    tracing::debug!(
        request_id = %request.request_id(),
        method = %request.method,
        path = %request.path(),
        "Dispatching request"
    );

    state.dispatcher.dispatch(&request).await
}
