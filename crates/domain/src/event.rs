//! Lifecycle events announced on the broker.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

/// The kind of a lifecycle event.
///
/// Only order creation is announced today; the enum keeps the wire
/// format closed so consumers can ignore kinds they do not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "new_order")]
    NewOrder,
}

/// A message announcing an order-state change.
///
/// Ephemeral: durability is the broker's job, and delivery is
/// at-least-once. Consumers must treat redelivery as possible and
/// process idempotently per order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub order_id: OrderId,
    pub emitted_at: DateTime<Utc>,
}

impl LifecycleEvent {
    /// Creates a `new_order` event stamped with the current time.
    pub fn new_order(order_id: OrderId) -> Self {
        Self {
            kind: EventKind::NewOrder,
            order_id,
            emitted_at: Utc::now(),
        }
    }
}
