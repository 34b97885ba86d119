//! Read-only health and status surface. Observability only, no side effects.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::types::ApiEnvelope;
use crate::gateway::server::AppState;

/// `GET /health` — plain liveness probe, exempt from rate limiting
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `GET /api/v1/gateway/status` — per-breaker state and rolling stats
pub async fn gateway_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshots = state.breakers.snapshots();
    let envelope = ApiEnvelope::ok(json!({
        "circuitBreakers": snapshots,
    }));
    Json(envelope)
}
