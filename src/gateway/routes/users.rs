//! User routes, fronting the identity service.
//!
//! All routes here sit behind the auth guard; each one declares its required
//! roles statically and checks them before any upstream traffic.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::Value;

use crate::auth::authorize;
use crate::core::error::GatewayResult;
use crate::core::types::{Claims, DomainEvent, Role};
use crate::gateway::aggregator;
use crate::gateway::routes::{event_data, shape_response, shape_response_with, ListQuery};
use crate::gateway::server::AppState;

/// `GET /api/v1/users` — paginated listing, Admin or Manager only
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
) -> GatewayResult<Response> {
    authorize(&claims, &[Role::Admin, Role::Manager])?;
    let query = ListQuery::parse(params)?;

    let response = state
        .upstreams
        .identity
        .request(Method::GET, "/users", None, &query.to_upstream_query())
        .await?;

    Ok(shape_response_with(response, query.filters(), query.sorting()))
}

/// `GET /api/v1/users/:id` — any authenticated caller
pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> GatewayResult<Response> {
    authorize(&claims, &[])?;

    let response = state
        .upstreams
        .identity
        .request(Method::GET, &format!("/users/{}", id), None, &[])
        .await?;

    Ok(shape_response(response))
}

/// `GET /api/v1/users/:id/details` — aggregated user + order history
pub async fn user_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> GatewayResult<Response> {
    authorize(&claims, &[])?;
    aggregator::user_with_orders(&state, &id).await
}

/// `PUT /api/v1/users/:id` — Admin or Manager; publishes `user.updated`
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> GatewayResult<Response> {
    authorize(&claims, &[Role::Admin, Role::Manager])?;

    let response = state
        .upstreams
        .identity
        .request(Method::PUT, &format!("/users/{}", id), Some(&payload), &[])
        .await?;

    if response.is_success() {
        let event =
            DomainEvent::new("user.updated", &id, event_data(&response.body["data"], &payload));
        state.events.publish(event).await;
    }

    Ok(shape_response(response))
}

/// `DELETE /api/v1/users/:id` — Admin only; publishes `user.deleted`
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> GatewayResult<Response> {
    authorize(&claims, &[Role::Admin])?;

    let response = state
        .upstreams
        .identity
        .request(Method::DELETE, &format!("/users/{}", id), None, &[])
        .await?;

    if response.is_success() {
        let event = DomainEvent::new(
            "user.deleted",
            &id,
            event_data(&response.body["data"], &serde_json::json!({"id": id})),
        );
        state.events.publish(event).await;
    }

    Ok(shape_response(response))
}
