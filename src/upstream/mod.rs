//! Outbound side of the gateway: HTTP clients for the two fronted services,
//! each wrapped in its own circuit breaker.

pub mod client;

pub use client::{UpstreamClient, Upstreams};
