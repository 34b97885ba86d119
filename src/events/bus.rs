//! # Event Bus
//!
//! Best-effort domain-event delivery to local subscribers. The bus is an
//! ordered map from event type to an ordered list of handlers; there is no
//! event store and no class hierarchy per event type.
//!
//! Delivery rules:
//! - `publish` never raises to the route handler. By the time an event
//!   exists the triggering upstream mutation has already committed, so a
//!   delivery failure must not roll it back or fail the response.
//! - Handlers run sequentially in subscription order; one handler's failure
//!   is logged and the remaining handlers still run.
//! - A [`RemoteBroker`] can be injected for out-of-process delivery but the
//!   slot is empty by default — local subscribers only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::core::types::DomainEvent;

/// Failure reported by a subscriber or broker; logged, never propagated
#[derive(Debug, Error)]
#[error("event handler failed: {0}")]
pub struct EventError(pub String);

/// A local event subscriber
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError>;
}

/// Extension point for out-of-process event delivery
///
/// Deliberately dormant: nothing in the gateway constructs a broker. Wiring
/// one in via [`EventBus::with_remote_broker`] is the supported path once a
/// real message broker exists.
#[async_trait]
pub trait RemoteBroker: Send + Sync {
    async fn deliver(&self, event: &DomainEvent) -> Result<(), EventError>;
}

/// Local-subscriber event bus
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    remote: Option<Arc<dyn RemoteBroker>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: RwLock::new(HashMap::new()), remote: None }
    }

    /// Inject a remote delivery path (inert by default)
    pub fn with_remote_broker(mut self, broker: Arc<dyn RemoteBroker>) -> Self {
        self.remote = Some(broker);
        self
    }

    /// Register a handler for one event type
    ///
    /// Handlers for the same type run in the order they were subscribed.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.subscribers.write().entry(event_type.into()).or_default().push(handler);
    }

    /// Deliver an event to its subscribers, swallowing every failure
    pub async fn publish(&self, event: DomainEvent) {
        debug!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            event_id = %event.id,
            "publishing domain event"
        );

        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .read()
            .get(&event.event_type)
            .map(|list| list.clone())
            .unwrap_or_default();

        for handler in handlers {
            if let Err(err) = handler.handle(&event).await {
                error!(
                    event_type = %event.event_type,
                    event_id = %event.id,
                    error = %err,
                    "event handler failed, continuing with remaining handlers"
                );
            }
        }

        if let Some(remote) = &self.remote {
            if let Err(err) = remote.deliver(&event).await {
                error!(
                    event_type = %event.event_type,
                    event_id = %event.id,
                    error = %err,
                    "remote broker delivery failed"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Default subscriber: structured audit log line per event
pub struct AuditLogger;

#[async_trait]
impl EventHandler for AuditLogger {
    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        info!(
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            event_id = %event.id,
            timestamp = %event.timestamp,
            "domain event"
        );
        Ok(())
    }
}
