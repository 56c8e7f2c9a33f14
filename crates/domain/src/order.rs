//! The order record and its line items.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::money::Money;
use crate::status::OrderStatus;

/// A single line of an order: a product reference and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product reference (free-form identifier or name).
    pub product: String,

    /// Quantity ordered, at least 1.
    #[serde(rename = "qty")]
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product: impl Into<String>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            quantity,
        }
    }
}

/// A customer order as recorded by the store.
///
/// The store adapter owns this record; the cache holds a TTL-bounded
/// copy that is refreshed or invalidated on every status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Validates creation input before it reaches the store.
///
/// Checks: at least one item, non-empty product references, and every
/// quantity at least 1. Price range is enforced by [`Money`] itself.
pub fn validate_new_order(items: &[LineItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        if item.product.trim().is_empty() {
            return Err(OrderError::Validation(
                "item product must not be empty".to_string(),
            ));
        }
        if item.quantity < 1 {
            return Err(OrderError::Validation(format!(
                "item {:?} quantity must be at least 1",
                item.product
            )));
        }
    }
    Ok(())
}
