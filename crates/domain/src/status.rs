//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Paid ──► Shipped
///           │
///           └──► Canceled
/// ```
///
/// `Shipped` and `Canceled` are terminal; no transition out of a
/// terminal status is accepted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Order recorded, awaiting payment or cancellation.
    #[default]
    Pending,

    /// Payment confirmed, awaiting shipment.
    Paid,

    /// Order has left the warehouse (terminal status).
    Shipped,

    /// Order was canceled (terminal status).
    Canceled,
}

impl OrderStatus {
    /// Returns true if the transition from `self` to `next` is allowed.
    ///
    /// This is the single transition table for the whole system; the
    /// store adapter checks it once inside the update transaction.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Canceled)
                | (OrderStatus::Paid, OrderStatus::Shipped)
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Canceled)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// Parses a wire-format status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "CANCELED" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> [OrderStatus; 4] {
        [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Canceled,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
