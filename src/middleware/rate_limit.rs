//! # Rate Limiting
//!
//! Fixed counting window per `(client key, route class)` pair, backed by a
//! `DashMap` so concurrent requests from the same client resolve without a
//! global lock.
//!
//! Two route classes exist: **general** (default 100 requests / 15 min) and
//! **credential** for the register/login routes (default 5 / 15 min). On the
//! credential class a request whose upstream call ultimately succeeds is
//! *forgiven* — its slot is refunded — so only failed attempts consume the
//! stricter budget and a legitimate retry after a typo is not penalized.
//!
//! Throttled requests receive the structured 429 with retry guidance and
//! never reach the router.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use tracing::debug;

use crate::core::config::{RateLimitSettings, WindowPolicy};
use crate::core::error::{GatewayError, GatewayResult};

/// Rate-limiting category of a route, distinct from role-based authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Every ordinary route
    General,
    /// Credential-issuing routes: registration and login
    Credential,
}

/// Client identity extracted for rate limiting, carried in request extensions
/// so credential-route handlers can forgive a successful attempt
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

/// One counting window
#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Process-local counting-window rate limiter
///
/// Buckets are ephemeral: when a window elapses the counter resets in place
/// on the next touch, and a periodic sweep evicts buckets nobody touched so
/// the map cannot grow without bound under churning client keys.
pub struct RateLimiter {
    buckets: DashMap<(String, RouteClass), Bucket>,
    settings: RateLimitSettings,
    admissions: AtomicU64,
}

/// How many admissions between eviction sweeps
const EVICT_INTERVAL: u64 = 1024;

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self { buckets: DashMap::new(), settings, admissions: AtomicU64::new(0) }
    }

    fn policy(&self, class: RouteClass) -> &WindowPolicy {
        match class {
            RouteClass::General => &self.settings.general,
            RouteClass::Credential => &self.settings.credential,
        }
    }

    /// Admit or throttle one request
    pub fn admit(&self, client: &str, class: RouteClass) -> GatewayResult<()> {
        if self.admissions.fetch_add(1, Ordering::Relaxed) % EVICT_INTERVAL == EVICT_INTERVAL - 1 {
            self.evict_expired();
        }

        let policy = self.policy(class);
        let now = Instant::now();

        let mut bucket = self
            .buckets
            .entry((client.to_string(), class))
            .or_insert_with(|| Bucket { window_start: now, count: 0 });

        if now.duration_since(bucket.window_start) >= policy.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= policy.max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after = policy.window.saturating_sub(elapsed);
            debug!(client, ?class, "request throttled");
            return Err(GatewayError::RateLimit {
                limit: policy.max_requests,
                window: format_window(policy.window),
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        bucket.count += 1;
        Ok(())
    }

    /// Refund one slot after a successful credential-route attempt
    pub fn forgive(&self, client: &str, class: RouteClass) {
        if let Some(mut bucket) = self.buckets.get_mut(&(client.to_string(), class)) {
            bucket.count = bucket.count.saturating_sub(1);
        }
    }

    /// Drop every bucket whose window has fully elapsed
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.buckets.retain(|(_, class), bucket| {
            now.duration_since(bucket.window_start) < self.policy(*class).window
        });
    }
}

fn format_window(window: Duration) -> String {
    let secs = window.as_secs();
    if secs % 60 == 0 && secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Classify a request path into its rate-limiting class
fn classify(path: &str) -> Option<RouteClass> {
    if path == "/health" {
        return None;
    }
    if path.starts_with("/api/v1/auth/") {
        return Some(RouteClass::Credential);
    }
    Some(RouteClass::General)
}

/// Resolve the client key
///
/// The socket peer is authoritative. The first `X-Forwarded-For` hop is used
/// only when the deployment declares a trusted proxy in front of the gateway;
/// otherwise any caller could rotate header values to dodge its buckets.
fn client_key(request: &Request, trust_proxy_header: bool) -> String {
    if trust_proxy_header {
        if let Some(forwarded) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
        {
            let forwarded = forwarded.trim();
            if !forwarded.is_empty() {
                return forwarded.to_string();
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate-limiting middleware, first guard on the request path
pub async fn limit_requests(
    State(limiter): State<std::sync::Arc<RateLimiter>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if let Some(class) = classify(request.uri().path()) {
        let client = client_key(&request, limiter.settings.trust_proxy_header);
        limiter.admit(&client, class)?;
        request.extensions_mut().insert(ClientKey(client));
    }
    Ok(next.run(request).await)
}
