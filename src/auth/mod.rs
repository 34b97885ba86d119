//! Authentication and authorization guards.

pub mod guard;

pub use guard::{authenticate, authorize, AuthVerifier};
