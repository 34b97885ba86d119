//! Order routes, fronting the order service.
//!
//! The order upstream owns payload validation and total computation; the
//! gateway passes its field-level validation errors through verbatim.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::Value;

use crate::auth::authorize;
use crate::core::error::GatewayResult;
use crate::core::types::{Claims, DomainEvent, Role};
use crate::gateway::routes::{event_data, id_str, shape_response, shape_response_with, ListQuery};
use crate::gateway::server::AppState;

/// `GET /api/v1/orders` — paginated listing, any authenticated caller
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
) -> GatewayResult<Response> {
    authorize(&claims, &[])?;
    let query = ListQuery::parse(params)?;

    let response = state
        .upstreams
        .orders
        .request(Method::GET, "/orders", None, &query.to_upstream_query())
        .await?;

    Ok(shape_response_with(response, query.filters(), query.sorting()))
}

/// `POST /api/v1/orders` — any authenticated caller; publishes `order.created`
///
/// The event's `aggregate_id` is the order id the upstream assigned; its
/// payload starts from the request items and is overlaid with the upstream's
/// response (computed `totalAmount` included).
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Value>,
) -> GatewayResult<Response> {
    authorize(&claims, &[])?;

    let response = state
        .upstreams
        .orders
        .request(Method::POST, "/orders", Some(&payload), &[])
        .await?;

    if response.is_success() {
        let created = &response.body["data"];
        if let Some(order_id) = id_str(&created["id"]) {
            let event =
                DomainEvent::new("order.created", order_id, event_data(created, &payload));
            state.events.publish(event).await;
        }
    }

    Ok(shape_response(response))
}

/// `GET /api/v1/orders/:id` — any authenticated caller
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> GatewayResult<Response> {
    authorize(&claims, &[])?;

    let response = state
        .upstreams
        .orders
        .request(Method::GET, &format!("/orders/{}", id), None, &[])
        .await?;

    Ok(shape_response(response))
}

/// `PATCH /api/v1/orders/:id/status` — Admin, Manager, or Engineer;
/// publishes `order.status_updated`
///
/// The upstream performs its own lookup-then-write; the gateway treats the
/// two as independently atomic and uses the response only as best-effort
/// event metadata.
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<Response> {
    authorize(&claims, &[Role::Admin, Role::Manager, Role::Engineer])?;

    let response = state
        .upstreams
        .orders
        .request(Method::PATCH, &format!("/orders/{}/status", id), Some(&payload), &[])
        .await?;

    if response.is_success() {
        let event = DomainEvent::new(
            "order.status_updated",
            &id,
            event_data(&response.body["data"], &payload),
        );
        state.events.publish(event).await;
    }

    Ok(shape_response(response))
}
