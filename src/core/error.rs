//! # Error Handling Module
//!
//! Defines the gateway's error taxonomy using the `thiserror` crate and maps
//! every variant to the HTTP status code the client should see. Errors render
//! as the uniform response envelope via `IntoResponse`, so handlers can simply
//! return `GatewayResult<T>` and let axum do the rest.
//!
//! Two propagation rules are enforced here rather than at the call sites:
//! - Upstream-reported errors (4xx/5xx bodies) are *not* modeled as
//!   `GatewayError` — they pass through the envelope shaper verbatim.
//! - Breaker/transport failures always collapse into `UpstreamUnavailable`
//!   with a fixed message; upstream topology detail stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Error taxonomy for the gateway core
///
/// Each variant represents one failure class with its own HTTP mapping.
/// The `#[error("...")]` attribute implements `Display` for log output;
/// the client-facing message comes from `IntoResponse` below.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Missing, malformed, or expired credential
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// Valid credential but insufficient role
    #[error("Authorization failed: {reason}")]
    Authorization { reason: String },

    /// Malformed request payload or query parameters
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Resource missing (either gateway-local or reported by an upstream)
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Rate limit bucket exhausted for the client/route class
    #[error("Rate limit exceeded: {limit} requests per {window}")]
    RateLimit { limit: u32, window: String, retry_after_secs: u64 },

    /// Breaker open, call timed out, or transport failure reaching an upstream
    #[error("Upstream unavailable: {service}")]
    UpstreamUnavailable { service: String },

    /// Configuration loading/validation failure (startup only)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected failure in the gateway's own logic
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create an authentication error with a custom reason
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Authentication { reason: reason.into() }
    }

    /// Create an authorization error with a custom reason
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Authorization { reason: reason.into() }
    }

    /// Create a validation error with a custom reason
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    /// Create a not-found error for the named resource
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create an upstream-unavailable error for the named service
    pub fn unavailable(service: impl Into<String>) -> Self {
        Self::UpstreamUnavailable { service: service.into() }
    }

    /// Create a configuration error with a custom message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an internal error with a custom message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Map this error to the HTTP status code clients should see
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication_error",
            Self::Authorization { .. } => "authorization_error",
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::RateLimit { .. } => "rate_limit_exceeded",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Configuration { .. } => "internal_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Message safe to expose to clients
    ///
    /// Internal and upstream-availability failures get fixed wording; the
    /// full detail is only ever logged server-side.
    fn client_message(&self) -> String {
        match self {
            Self::UpstreamUnavailable { .. } => {
                "Service temporarily unavailable, please retry later".to_string()
            }
            Self::Configuration { .. } | Self::Internal { .. } => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration { message: err.to_string() }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}

/// Render errors as the uniform envelope `{success: false, error: {...}}`
///
/// This keeps guard failures, throttling, and breaker fallbacks
/// indistinguishable in shape from upstream-reported error envelopes.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type = self.error_type(), "request failed");
        } else {
            tracing::debug!(error = %self, error_type = self.error_type(), "request rejected");
        }

        let mut error_body = json!({
            "type": self.error_type(),
            "message": self.client_message(),
        });
        if let Self::RateLimit { retry_after_secs, .. } = &self {
            error_body["retry_after_secs"] = json!(retry_after_secs);
        }

        let envelope = json!({
            "success": false,
            "error": error_body,
        });

        (status, Json(envelope)).into_response()
    }
}
