//! Request-path middleware: rate limiting runs before the auth guards and
//! never lets a throttled request reach the router.

pub mod rate_limit;

pub use rate_limit::{limit_requests, ClientKey, RateLimiter, RouteClass};
