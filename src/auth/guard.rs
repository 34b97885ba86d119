//! # Auth Guard / Role Guard
//!
//! Bearer-token verification and role-based authorization.
//!
//! The auth guard runs as axum middleware on every protected route: it pulls
//! the `Authorization: Bearer <token>` header, verifies signature and expiry
//! against the shared secret, and attaches the decoded [`Claims`] to the
//! request extensions for the rest of the request's lifecycle. Absent,
//! malformed, or expired credentials are rejected with 401 before any
//! routing or upstream traffic.
//!
//! The role guard is a plain function handlers call with their statically
//! declared role list; there is no dynamic policy evaluation.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{Claims, Role};

/// Verifies bearer tokens against the shared HMAC secret
///
/// The secret is owned by the identity upstream (an external trust
/// collaborator); the gateway only verifies.
pub struct AuthVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // An expired token is never accepted, not even within a leeway window.
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a bearer token, producing claims
    pub fn verify(&self, token: &str) -> GatewayResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "token verification failed");
                GatewayError::auth("invalid or expired token")
            })
    }
}

/// Extract the bearer token from the `Authorization` header
fn bearer_token(headers: &HeaderMap) -> GatewayResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| GatewayError::auth("missing Authorization header"))?;
    let value = header
        .to_str()
        .map_err(|_| GatewayError::auth("malformed Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| GatewayError::auth("expected Bearer credential"))
}

/// Authentication middleware for protected routes
///
/// On success the verified claims ride the request extensions; handlers
/// retrieve them with `Extension<Claims>`.
pub async fn authenticate(
    State(verifier): State<Arc<AuthVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = bearer_token(request.headers())?;
    let claims = verifier.verify(token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Role guard: grant access iff the caller's roles intersect `required`
///
/// An empty `required` list means any authenticated caller passes.
pub fn authorize(claims: &Claims, required: &[Role]) -> GatewayResult<()> {
    if claims.has_any_role(required) {
        Ok(())
    } else {
        debug!(
            subject = %claims.sub,
            required = ?required,
            held = ?claims.roles,
            "role check failed"
        );
        Err(GatewayError::forbidden("insufficient role for this route"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn now_secs() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn customer_claims(exp: u64) -> Claims {
        Claims { sub: "u-1".into(), roles: vec![Role::Customer], iat: now_secs(), exp }
    }

    #[test]
    fn test_valid_token_round_trip() {
        let verifier = AuthVerifier::new(SECRET);
        let token = sign(&customer_claims(now_secs() + 3600), SECRET);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.roles, vec![Role::Customer]);
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = AuthVerifier::new(SECRET);
        let token = sign(&customer_claims(now_secs() - 10), SECRET);

        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, GatewayError::Authentication { .. }));
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let verifier = AuthVerifier::new(SECRET);
        let token = sign(&customer_claims(now_secs() + 3600), "other-secret");
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = AuthVerifier::new(SECRET);
        assert!(verifier.verify("not.a.token").is_err());
    }

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_role_guard() {
        let claims = customer_claims(now_secs() + 3600);
        assert!(authorize(&claims, &[]).is_ok());
        assert!(authorize(&claims, &[Role::Customer, Role::Admin]).is_ok());

        let err = authorize(&claims, &[Role::Admin]).unwrap_err();
        assert!(matches!(err, GatewayError::Authorization { .. }));
    }
}
