//! Credential-issuing routes: registration and login.
//!
//! Both are public (no auth guard) but sit in the stricter credential
//! rate-limit class. A request whose upstream call succeeds refunds its
//! rate-limit slot; failed attempts keep consuming the budget.

use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use reqwest::Method;
use serde_json::Value;

use crate::core::error::GatewayResult;
use crate::core::types::DomainEvent;
use crate::gateway::routes::{event_data, id_str, shape_response};
use crate::gateway::server::AppState;
use crate::middleware::{ClientKey, RouteClass};

/// `POST /api/v1/auth/register` → identity `POST /users/register`
///
/// Publishes `user.registered` after a success envelope. Duplicate-email
/// conflicts (or any other upstream rejection) pass through unmodified and
/// still count against the credential budget.
pub async fn register(
    State(state): State<AppState>,
    client: Option<Extension<ClientKey>>,
    Json(payload): Json<Value>,
) -> GatewayResult<Response> {
    let response = state
        .upstreams
        .identity
        .request(Method::POST, "/users/register", Some(&payload), &[])
        .await?;

    if response.is_success() {
        forgive(&state, client.map(|Extension(key)| key));

        let created = &response.body["data"];
        if let Some(user_id) = id_str(&created["id"]) {
            let event = DomainEvent::new(
                "user.registered",
                user_id,
                event_data(created, &sanitized(&payload)),
            );
            state.events.publish(event).await;
        }
    }

    Ok(shape_response(response))
}

/// `POST /api/v1/auth/login` → identity `POST /users/login`
///
/// The identity upstream issues the token; the gateway only relays it. A
/// successful login is forgiven on the credential window.
pub async fn login(
    State(state): State<AppState>,
    client: Option<Extension<ClientKey>>,
    Json(payload): Json<Value>,
) -> GatewayResult<Response> {
    let response = state
        .upstreams
        .identity
        .request(Method::POST, "/users/login", Some(&payload), &[])
        .await?;

    if response.is_success() {
        forgive(&state, client.map(|Extension(key)| key));
    }

    Ok(shape_response(response))
}

fn forgive(state: &AppState, client: Option<ClientKey>) {
    if let Some(ClientKey(client)) = client {
        state.limiter.forgive(&client, RouteClass::Credential);
    }
}

/// Never let credentials leak into event payloads
fn sanitized(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("password");
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_password_stripped_from_event_input() {
        let cleaned = sanitized(&json!({
            "email": "ana@example.com",
            "password": "hunter2",
            "name": "Ana"
        }));
        assert!(cleaned.get("password").is_none());
        assert_eq!(cleaned["email"], json!("ana@example.com"));
    }
}
