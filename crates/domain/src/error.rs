//! Domain error types.

use thiserror::Error;

use crate::status::OrderStatus;

/// Errors raised by the order domain model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Input failed shape or range validation (client-fixable).
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested status change is not in the transition table.
    /// Both sides of the rejected pair are part of the message.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
