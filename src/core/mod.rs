//! Core functionality: error taxonomy, configuration, shared types, and the
//! per-upstream circuit breaker state machine.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod types;
