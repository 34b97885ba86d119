//! # Configuration Module
//!
//! Gateway configuration loaded from a YAML file with environment-variable
//! overrides, validated once at startup. Every section carries a `Default`
//! impl so a missing file still yields a runnable local setup.
//!
//! Durations are written human-readable in YAML (`3s`, `15m`) via
//! `humantime_serde`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::{GatewayError, GatewayResult};

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub upstreams: UpstreamSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 8080 }
    }
}

/// Base URLs for the two fronted services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub identity_url: String,
    pub orders_url: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            identity_url: "http://localhost:4001".to_string(),
            orders_url: "http://localhost:4002".to_string(),
        }
    }
}

/// Circuit breaker tuning, shared by both upstream breakers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Failure ratio over the rolling window that opens the circuit (0.0–1.0)
    pub failure_ratio: f64,
    /// Minimum calls in the window before the ratio is evaluated
    pub min_samples: u32,
    /// Length of the rolling sample window
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Per-call deadline; an expired call is abandoned and counted as a failure
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    /// How long the circuit stays open before admitting a probe
    #[serde(with = "humantime_serde")]
    pub cool_down: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            min_samples: 5,
            window: Duration::from_secs(10),
            call_timeout: Duration::from_millis(3000),
            cool_down: Duration::from_millis(3000),
        }
    }
}

/// One counting-window policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowPolicy {
    pub max_requests: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

/// Rate limit tuning for the two route classes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub general: WindowPolicy,
    /// Stricter budget for credential-issuing routes (register, login)
    pub credential: WindowPolicy,
    /// Key clients by the first `X-Forwarded-For` hop instead of the socket
    /// peer. Enable only behind a proxy that overwrites the header.
    pub trust_proxy_header: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            general: WindowPolicy { max_requests: 100, window: Duration::from_secs(900) },
            credential: WindowPolicy { max_requests: 5, window: Duration::from_secs(900) },
            trust_proxy_header: false,
        }
    }
}

/// Token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared HMAC secret for token verification; key management is external
    pub jwt_secret: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self { jwt_secret: "dev-secret-change-me".to_string() }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub async fn load_from_file(path: &str) -> GatewayResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::config(format!("failed to read config file {}: {}", path, e))
        })?;
        let mut config: GatewayConfig = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from defaults plus environment overrides
    ///
    /// Used when no config file is present (local development, tests).
    pub fn from_env() -> GatewayResult<Self> {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GATEWAY_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_IDENTITY_URL") {
            self.upstreams.identity_url = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_ORDERS_URL") {
            self.upstreams.orders_url = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
    }

    /// Reject configurations the dispatch core cannot run with
    pub fn validate(&self) -> GatewayResult<()> {
        if !(0.0..=1.0).contains(&self.circuit_breaker.failure_ratio) {
            return Err(GatewayError::config(format!(
                "circuit_breaker.failure_ratio must be within 0.0..=1.0, got {}",
                self.circuit_breaker.failure_ratio
            )));
        }
        if self.circuit_breaker.min_samples == 0 {
            return Err(GatewayError::config("circuit_breaker.min_samples must be at least 1"));
        }
        if self.circuit_breaker.call_timeout.is_zero() {
            return Err(GatewayError::config("circuit_breaker.call_timeout must be non-zero"));
        }
        for (name, policy) in
            [("general", &self.rate_limit.general), ("credential", &self.rate_limit.credential)]
        {
            if policy.max_requests == 0 {
                return Err(GatewayError::config(format!(
                    "rate_limit.{}.max_requests must be at least 1",
                    name
                )));
            }
        }
        for (name, url) in [
            ("identity_url", &self.upstreams.identity_url),
            ("orders_url", &self.upstreams.orders_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(GatewayError::config(format!(
                    "upstreams.{} must be an http(s) URL, got {}",
                    name, url
                )));
            }
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(GatewayError::config("auth.jwt_secret must not be empty"));
        }
        Ok(())
    }
}
