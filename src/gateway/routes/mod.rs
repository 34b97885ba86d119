//! # Route Handlers
//!
//! One handler per declared external route. Every handler runs after the
//! rate limiter and (where applicable) the auth guard, performs its static
//! role check, delegates to the upstream client(s), and shapes the uniform
//! response envelope.
//!
//! Envelope shaping is centralized here: a 2xx upstream status becomes a
//! success envelope, anything else becomes an error envelope carrying the
//! upstream's error body verbatim with its original status code.

pub mod auth_routes;
pub mod orders;
pub mod status;
pub mod users;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{ApiEnvelope, UpstreamResponse};

/// Query parameters accepted by paginating list routes
///
/// `page` and `limit` are validated at the boundary; everything else is
/// treated as upstream-owned filter/sort input and passed through untouched.
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    /// Remaining query pairs (filters plus `sortBy`/`order`)
    pub passthrough: Vec<(String, String)>,
}

impl ListQuery {
    /// Validate and normalize raw query parameters
    ///
    /// Defaults: page 1, limit 10. Bounds: page ≥ 1, limit 1–100.
    pub fn parse(mut params: HashMap<String, String>) -> GatewayResult<Self> {
        let page = match params.remove("page") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| GatewayError::validation("page must be an integer >= 1"))?,
            None => 1,
        };
        let limit = match params.remove("limit") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|l| (1..=100).contains(l))
                .ok_or_else(|| {
                    GatewayError::validation("limit must be an integer between 1 and 100")
                })?,
            None => 10,
        };

        let mut passthrough: Vec<(String, String)> = params.into_iter().collect();
        passthrough.sort();

        Ok(Self { page, limit, passthrough })
    }

    /// Full query set to forward to the upstream
    pub fn to_upstream_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        query.extend(self.passthrough.iter().cloned());
        query
    }

    /// Applied filters to echo in the envelope (sort keys excluded)
    pub fn filters(&self) -> Option<Value> {
        let map: Map<String, Value> = self
            .passthrough
            .iter()
            .filter(|(k, _)| k != "sortBy" && k != "order")
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        (!map.is_empty()).then(|| Value::Object(map))
    }

    /// Applied sort order to echo in the envelope
    pub fn sorting(&self) -> Option<Value> {
        let sort_by = self.passthrough.iter().find(|(k, _)| k == "sortBy");
        sort_by.map(|(_, field)| {
            let order = self
                .passthrough
                .iter()
                .find(|(k, _)| k == "order")
                .map(|(_, v)| v.as_str())
                .unwrap_or("asc");
            json!({"sortBy": field, "order": order})
        })
    }
}

/// Shape one upstream result into the gateway envelope
///
/// The upstream's status code is preserved on both paths. For list routes the
/// upstream's own pagination metadata is echoed, never recomputed.
pub fn shape_response(upstream: UpstreamResponse) -> Response {
    shape_response_with(upstream, None, None)
}

/// Envelope shaping with filter/sort echo for list routes
pub fn shape_response_with(
    upstream: UpstreamResponse,
    filters: Option<Value>,
    sorting: Option<Value>,
) -> Response {
    let status =
        StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let envelope = if upstream.is_success() {
        let (data, pagination) = split_success_body(upstream.body);
        let mut envelope = ApiEnvelope::ok(data);
        if let Some(pagination) = pagination {
            envelope = envelope.with_pagination(pagination);
        }
        if let Some(filters) = filters {
            envelope = envelope.with_filters(filters);
        }
        if let Some(sorting) = sorting {
            envelope = envelope.with_sorting(sorting);
        }
        envelope
    } else {
        ApiEnvelope::err(error_body(upstream.body))
    };

    (status, Json(envelope)).into_response()
}

/// Pull `data` and `pagination` out of an upstream success body
///
/// Upstreams respond either with a plain resource body or with their own
/// `{data, pagination}` wrapper; both shapes normalize to the same envelope.
fn split_success_body(body: Value) -> (Value, Option<Value>) {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            let data = map.remove("data").unwrap_or(Value::Null);
            let pagination = map.remove("pagination");
            (data, pagination)
        }
        other => (other, None),
    }
}

/// Extract the error section of an upstream error body, verbatim
///
/// Validation detail (field-level errors) passes through untouched.
fn error_body(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("error") => {
            map.remove("error").unwrap_or(Value::Null)
        }
        Value::Null => json!({"message": "upstream returned no error detail"}),
        other => other,
    }
}

/// Assemble a domain event's payload from the upstream response body,
/// falling back to the request input for fields the upstream omitted
pub fn event_data(response_data: &Value, request_input: &Value) -> Value {
    match (response_data, request_input) {
        (Value::Object(response), Value::Object(request)) => {
            let mut merged = request.clone();
            for (key, value) in response {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (Value::Null, request) => request.clone(),
        (response, _) => response.clone(),
    }
}

/// Canonical string form of an id appearing in a path or upstream body
///
/// Upstreams are loose about id types (string vs integer); the gateway
/// compares everything as strings.
pub fn id_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListQuery::parse(HashMap::new()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert!(query.filters().is_none());
        assert!(query.sorting().is_none());
    }

    #[test]
    fn test_list_query_bounds() {
        assert!(ListQuery::parse(params(&[("page", "0")])).is_err());
        assert!(ListQuery::parse(params(&[("page", "abc")])).is_err());
        assert!(ListQuery::parse(params(&[("limit", "0")])).is_err());
        assert!(ListQuery::parse(params(&[("limit", "101")])).is_err());
        assert!(ListQuery::parse(params(&[("limit", "100")])).is_ok());
    }

    #[test]
    fn test_list_query_passthrough_and_echo() {
        let query = ListQuery::parse(params(&[
            ("page", "2"),
            ("status", "pending"),
            ("sortBy", "createdAt"),
            ("order", "desc"),
        ]))
        .unwrap();

        let upstream = query.to_upstream_query();
        assert!(upstream.contains(&("page".to_string(), "2".to_string())));
        assert!(upstream.contains(&("status".to_string(), "pending".to_string())));

        assert_eq!(query.filters().unwrap(), json!({"status": "pending"}));
        assert_eq!(query.sorting().unwrap(), json!({"sortBy": "createdAt", "order": "desc"}));
    }

    #[test]
    fn test_split_success_body_shapes() {
        let (data, pagination) = split_success_body(json!({
            "data": [{"id": "o-1"}],
            "pagination": {"page": 1, "totalPages": 3}
        }));
        assert_eq!(data, json!([{"id": "o-1"}]));
        assert_eq!(pagination.unwrap()["totalPages"], json!(3));

        let (data, pagination) = split_success_body(json!({"id": "u-1"}));
        assert_eq!(data, json!({"id": "u-1"}));
        assert!(pagination.is_none());
    }

    #[test]
    fn test_error_body_passthrough() {
        let body = error_body(json!({
            "error": {"message": "Validation failed", "fields": [{"field": "email"}]}
        }));
        assert_eq!(body["fields"][0]["field"], json!("email"));
    }

    #[test]
    fn test_event_data_merging() {
        // Upstream fields win; request fields fill the gaps.
        let merged = event_data(
            &json!({"id": "o-1", "totalAmount": 20}),
            &json!({"items": [{"productId": "p1"}], "totalAmount": 0}),
        );
        assert_eq!(merged["id"], json!("o-1"));
        assert_eq!(merged["totalAmount"], json!(20));
        assert_eq!(merged["items"][0]["productId"], json!("p1"));

        // Upstream omitted a body entirely: request input stands in.
        let merged = event_data(&Value::Null, &json!({"status": "shipped"}));
        assert_eq!(merged["status"], json!("shipped"));
    }

    #[test]
    fn test_id_normalization() {
        assert_eq!(id_str(&json!("u-1")), Some("u-1".to_string()));
        assert_eq!(id_str(&json!(42)), Some("42".to_string()));
        assert_eq!(id_str(&json!({"id": 1})), None);
    }
}
