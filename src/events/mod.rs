//! Domain event publishing: local subscriber bus plus the dormant
//! remote-broker extension point.

pub mod bus;

pub use bus::{AuditLogger, EventBus, EventError, EventHandler, RemoteBroker};
