//! # Aggregator
//!
//! Composes the "user with their orders" read from both upstreams. The two
//! calls are issued concurrently and joined; the identity lookup is the
//! primary read and decides the outcome:
//!
//! - Primary not-found → not-found, regardless of the orders call.
//! - Orders failure (breaker short-circuit included) → `orders: []` and the
//!   response still reports success. Partial results are acceptable for this
//!   read-only aggregation; the primary read is what the caller asked for.
//!
//! Order entries are filtered to those whose `userId` foreign key matches
//! the requested id, compared canonically as strings.

use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::warn;

use crate::core::error::GatewayResult;
use crate::core::types::ApiEnvelope;
use crate::gateway::routes::{id_str, shape_response};
use crate::gateway::server::AppState;

/// Aggregated read backing `GET /api/v1/users/:id/details`
pub async fn user_with_orders(state: &AppState, user_id: &str) -> GatewayResult<Response> {
    // Bound outside the futures: both calls borrow these until the join.
    let user_path = format!("/users/{}", user_id);
    let orders_query = [("userId".to_string(), user_id.to_string())];

    let identity_call = state.upstreams.identity.request(Method::GET, &user_path, None, &[]);
    let orders_call =
        state.upstreams.orders.request(Method::GET, "/orders", None, &orders_query);

    let (primary, secondary) = tokio::join!(identity_call, orders_call);

    // The primary result decides everything, including not-found.
    let primary = primary?;
    if !primary.is_success() {
        return Ok(shape_response(primary));
    }
    let user = primary.body.get("data").cloned().unwrap_or(primary.body);

    let orders = match secondary {
        Ok(response) if response.is_success() => {
            filter_orders(&response.body, user_id)
        }
        Ok(response) => {
            warn!(
                status = response.status,
                user_id, "orders upstream rejected aggregation read, degrading to empty list"
            );
            Vec::new()
        }
        Err(err) => {
            warn!(
                error = %err,
                user_id, "orders upstream unavailable for aggregation, degrading to empty list"
            );
            Vec::new()
        }
    };

    let envelope = ApiEnvelope::ok(json!({
        "user": user,
        "orders": orders,
    }));
    Ok(Json(envelope).into_response())
}

/// Keep only the orders belonging to `user_id`
///
/// The upstream already filters by `userId`, but its pagination/filter
/// behavior is not contractual here; the gateway re-checks the foreign key
/// on every entry it returns.
fn filter_orders(body: &Value, user_id: &str) -> Vec<Value> {
    let collection = match body.get("data") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Object(map)) => match map.get("orders") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    collection
        .iter()
        .filter(|order| {
            order
                .get("userId")
                .and_then(id_str)
                .map(|fk| fk == user_id)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_by_foreign_key() {
        let body = json!({
            "data": [
                {"id": "o-1", "userId": "u-1"},
                {"id": "o-2", "userId": "u-2"},
                {"id": "o-3", "userId": "u-1"},
            ]
        });
        let orders = filter_orders(&body, "u-1");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0]["id"], json!("o-1"));
    }

    #[test]
    fn test_numeric_foreign_keys_compare_as_strings() {
        let body = json!({"data": [{"id": "o-1", "userId": 7}]});
        assert_eq!(filter_orders(&body, "7").len(), 1);
        assert_eq!(filter_orders(&body, "8").len(), 0);
    }

    #[test]
    fn test_nested_collection_shape() {
        let body = json!({"data": {"orders": [{"id": "o-1", "userId": "u-1"}]}});
        assert_eq!(filter_orders(&body, "u-1").len(), 1);
    }

    #[test]
    fn test_missing_or_malformed_collection_yields_empty() {
        assert!(filter_orders(&json!({}), "u-1").is_empty());
        assert!(filter_orders(&json!({"data": "oops"}), "u-1").is_empty());
        assert!(filter_orders(&json!({"data": [{"id": "o-1"}]}), "u-1").is_empty());
    }
}
