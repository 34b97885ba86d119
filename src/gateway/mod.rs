//! Gateway assembly: route handlers, the cross-service aggregator, and the
//! server that ties the dispatch core together.

pub mod aggregator;
pub mod routes;
pub mod server;

pub use server::{build_router, AppState, GatewayServer};
