//! # Commerce Gateway - Core Library Crate
//!
//! An API gateway fronting the user-identity and order services behind one
//! external HTTP surface. The engineered core is the request-dispatch path:
//!
//! - Per-upstream circuit breaking with a fixed 503 fallback
//! - Bearer-token authentication and role-based authorization
//! - Deterministic identity+orders response aggregation
//! - Best-effort domain-event emission after state-changing calls
//!
//! Request flow: rate limiter → auth guard → role guard → router →
//! upstream client(s) via circuit breaker(s) → (event publisher) →
//! response envelope.

/// Error taxonomy, configuration, shared types, and the circuit breaker
pub mod core;

/// Authentication and authorization guards
pub mod auth;

/// Request-path middleware (rate limiting)
pub mod middleware;

/// Outbound clients for the two fronted services
pub mod upstream;

/// Domain-event bus with local subscribers
pub mod events;

/// Router assembly, route handlers, aggregator, and the server
pub mod gateway;

// Re-exports for the common entry points so callers don't need to know the
// module layout.
pub use crate::core::config::GatewayConfig;
pub use crate::core::error::{GatewayError, GatewayResult};
pub use crate::gateway::{build_router, AppState, GatewayServer};
