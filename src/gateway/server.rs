//! # Gateway Server
//!
//! Assembles the dispatch core into one axum application: shared state, the
//! declared route table, and the guard ordering (rate limiter → auth guard →
//! role guard) enforced by layer placement. The rate-limit layer wraps the
//! whole surface; the auth layer wraps only the protected subrouter, so the
//! credential routes and status surface stay public.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, AuthVerifier};
use crate::core::circuit_breaker::BreakerSet;
use crate::core::config::GatewayConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::events::{AuditLogger, EventBus};
use crate::gateway::routes::{auth_routes, orders, status, users};
use crate::middleware::{self, RateLimiter};
use crate::upstream::Upstreams;

/// Event types emitted by the route handlers
const EVENT_TYPES: [&str; 5] =
    ["user.registered", "user.updated", "user.deleted", "order.created", "order.status_updated"];

/// Shared state for every request task
///
/// Only the breakers and the rate-limit buckets are mutable across requests;
/// both synchronize internally, so no global lock serializes unrelated
/// requests.
#[derive(Clone)]
pub struct AppState {
    pub upstreams: Upstreams,
    pub breakers: BreakerSet,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<AuthVerifier>,
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let breakers = BreakerSet::new(&config.circuit_breaker);
        let upstreams = Upstreams::new(&config.upstreams, &breakers);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let verifier = Arc::new(AuthVerifier::new(&config.auth.jwt_secret));

        let events = EventBus::new();
        for event_type in EVENT_TYPES {
            events.subscribe(event_type, Arc::new(AuditLogger));
        }

        Self { upstreams, breakers, limiter, verifier, events: Arc::new(events) }
    }
}

/// Build the full gateway router with guards in their declared order
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/v1/auth/register", post(auth_routes::register))
        .route("/api/v1/auth/login", post(auth_routes::login))
        .route("/api/v1/gateway/status", get(status::gateway_status))
        .route("/health", get(status::health));

    let protected = Router::new()
        .route("/api/v1/users", get(users::list_users))
        .route(
            "/api/v1/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/api/v1/users/:id/details", get(users::user_details))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", patch(orders::update_order_status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.verifier.clone(),
            auth::authenticate,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(unknown_route)
        // Outermost request-path guard: throttled requests never reach the
        // router or the auth guard.
        .layer(axum::middleware::from_fn_with_state(
            state.limiter.clone(),
            middleware::limit_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Unmatched paths get the uniform not-found envelope instead of axum's
/// bare 404
async fn unknown_route(uri: axum::http::Uri) -> GatewayError {
    GatewayError::not_found(format!("route {}", uri.path()))
}

/// The running gateway: bound address plus assembled state
pub struct GatewayServer {
    state: AppState,
    bind_addr: SocketAddr,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let bind_addr = format!("{}:{}", config.server.bind_address, config.server.port)
            .parse()
            .map_err(|e| GatewayError::config(format!("invalid bind address: {}", e)))?;
        Ok(Self { state: AppState::from_config(&config), bind_addr })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until a shutdown signal arrives
    pub async fn serve(self) -> GatewayResult<()> {
        let router = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "gateway listening");

        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("gateway shut down cleanly");
        Ok(())
    }
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
