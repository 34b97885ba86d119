//! # Upstream Client
//!
//! Issues the actual HTTP calls to a fronted service through that service's
//! circuit breaker, normalizing every completion into an [`UpstreamResponse`].
//!
//! The client never treats a non-2xx status as an error: upstream-reported
//! statuses and bodies flow back to the router verbatim so they can be passed
//! through to the caller. Only transport-level failures (connection refusal,
//! DNS failure), deadline expiry, and breaker short-circuits surface as
//! `GatewayError::UpstreamUnavailable` — the fixed 503 fallback. The detail
//! behind that fallback is logged here and never leaves the process.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error};

use crate::core::circuit_breaker::{BreakerError, BreakerSet, CircuitBreaker};
use crate::core::config::UpstreamSettings;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::UpstreamResponse;

/// HTTP client for one upstream service, guarded by its breaker
#[derive(Clone)]
pub struct UpstreamClient {
    service: String,
    base_url: String,
    http: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
}

impl UpstreamClient {
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            service: service.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            // Deadlines are enforced by the breaker, not the client.
            http: reqwest::Client::new(),
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Issue one call to the upstream through the breaker
    ///
    /// `path` is joined onto the configured base URL; `query` pairs are
    /// appended as-is (pagination, filters, sort order).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(String, String)],
    ) -> GatewayResult<UpstreamResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = %self.service, %method, %url, "dispatching upstream call");

        let result = self
            .breaker
            .call(async {
                let mut request = self.http.request(method, &url);
                if !query.is_empty() {
                    request = request.query(query);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request.send().await?;
                let status = response.status().as_u16();
                // Empty and non-JSON bodies normalize to Null; the envelope
                // shaper treats that as "no data".
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                Ok::<_, reqwest::Error>(UpstreamResponse::new(status, body))
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(BreakerError::Open { service }) => {
                Err(GatewayError::unavailable(service))
            }
            Err(BreakerError::Timeout { service, timeout }) => {
                error!(service = %service, ?timeout, "upstream call timed out");
                Err(GatewayError::unavailable(service))
            }
            Err(BreakerError::Inner(err)) => {
                error!(service = %self.service, error = %err, "upstream transport failure");
                Err(GatewayError::unavailable(&self.service))
            }
        }
    }
}

/// The two upstream clients shared by every request task
#[derive(Clone)]
pub struct Upstreams {
    pub identity: UpstreamClient,
    pub orders: UpstreamClient,
}

impl Upstreams {
    pub fn new(settings: &UpstreamSettings, breakers: &BreakerSet) -> Self {
        Self {
            identity: UpstreamClient::new(
                "identity",
                &settings.identity_url,
                breakers.identity.clone(),
            ),
            orders: UpstreamClient::new("orders", &settings.orders_url, breakers.orders.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CircuitBreakerSettings;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> UpstreamClient {
        let settings = CircuitBreakerSettings {
            call_timeout: Duration::from_millis(300),
            ..CircuitBreakerSettings::default()
        };
        let breaker = Arc::new(CircuitBreaker::new("identity", settings));
        UpstreamClient::new("identity", base_url, breaker)
    }

    #[tokio::test]
    async fn test_passes_status_and_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "u-1", "email": "ana@example.com"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.request(Method::GET, "/users/u-1", None, &[]).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["data"]["id"], json!("u-1"));
    }

    #[tokio::test]
    async fn test_client_error_is_data_not_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "User not found"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.request(Method::GET, "/users/missing", None, &[]).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(client.breaker().snapshot().failed_calls, 0);
    }

    #[tokio::test]
    async fn test_query_and_body_forwarding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_json(json!({"items": [{"productId": "p1"}]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "o-1"}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = json!({"items": [{"productId": "p1"}]});
        let created = client.request(Method::POST, "/orders", Some(&body), &[]).await.unwrap();
        assert_eq!(created.status, 201);

        let listed = client
            .request(
                Method::GET,
                "/orders",
                None,
                &[("page".into(), "2".into()), ("limit".into(), "5".into())],
            )
            .await
            .unwrap();
        assert_eq!(listed.status, 200);
    }

    #[tokio::test]
    async fn test_connection_failure_maps_to_unavailable() {
        // Nothing listens on this port.
        let client = test_client("http://127.0.0.1:1");
        let err = client.request(Method::GET, "/users", None, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
        assert_eq!(client.breaker().snapshot().failed_calls, 1);
    }

    #[tokio::test]
    async fn test_slow_upstream_hits_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.request(Method::GET, "/orders", None, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
    }
}
