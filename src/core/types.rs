//! # Core Types Module
//!
//! Foundational data structures shared across the gateway: the caller's
//! identity claims, the uniform response envelope, the normalized upstream
//! call result, and the domain event shape emitted after state-changing
//! operations.
//!
//! Ids are canonically strings at the gateway boundary. Path ids and foreign
//! keys coming back from upstreams are both normalized to `String` before any
//! comparison, so aggregation never relies on implicit type coercion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Roles recognized by the gateway
///
/// A route declares a required subset; access is granted when the caller's
/// role set intersects it. The set is closed — unknown role strings in a
/// token fail deserialization and therefore authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Engineer,
    Manager,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Engineer => write!(f, "engineer"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Verified identity claims extracted from a bearer token
///
/// Produced once per request by the auth guard and carried in the request
/// extensions; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id of the authenticated caller
    pub sub: String,
    /// Role set granted to the caller
    pub roles: Vec<Role>,
    /// Issued-at, seconds since the epoch
    pub iat: u64,
    /// Expiry, seconds since the epoch (validated by the auth guard)
    pub exp: u64,
}

impl Claims {
    /// True when the claims' role set intersects `required`
    ///
    /// An empty `required` slice means the route only needs authentication.
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        required.is_empty() || self.roles.iter().any(|r| required.contains(r))
    }
}

/// Uniform response envelope returned by every gateway route
///
/// `{success, data|error, pagination?, filters?, sorting?}` — optional
/// sections are omitted from the JSON entirely rather than serialized null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorting: Option<Value>,
}

impl ApiEnvelope {
    /// Success envelope carrying `data`
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            pagination: None,
            filters: None,
            sorting: None,
        }
    }

    /// Error envelope carrying an upstream or gateway error body
    pub fn err(error: Value) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            pagination: None,
            filters: None,
            sorting: None,
        }
    }

    /// Attach pagination metadata echoed from the upstream
    pub fn with_pagination(mut self, pagination: Value) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Attach the filters that were applied to a list read
    pub fn with_filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Attach the sort order that was applied to a list read
    pub fn with_sorting(mut self, sorting: Value) -> Self {
        self.sorting = Some(sorting);
        self
    }
}

/// Normalized result of one upstream HTTP call
///
/// `succeeded` is breaker-relevant and deliberately distinct from the HTTP
/// status: a completed 4xx is a client error, not an upstream failure, while
/// 5xx counts against the breaker window alongside timeouts and transport
/// errors (which never produce an `UpstreamResponse` at all).
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status code returned by the upstream
    pub status: u16,
    /// Response body, parsed as JSON (`Value::Null` for empty bodies)
    pub body: Value,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when this completion should count against the breaker window
    pub fn is_upstream_failure(&self) -> bool {
        self.status >= 500
    }
}

/// Immutable domain event emitted after a successful state-changing call
///
/// One struct with a `type` tag and free-form payload; there is no event
/// class hierarchy and no event store — events live only long enough to be
/// dispatched to local subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Resource id of the triggering call
    pub aggregate_id: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
}

impl DomainEvent {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            data,
            timestamp: Utc::now(),
            schema_version: 1,
        }
    }
}
