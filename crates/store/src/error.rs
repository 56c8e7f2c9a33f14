use common::OrderId;
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when interacting with the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A user with this email is already registered.
    #[error("a user with email {0:?} is already registered")]
    DuplicateEmail(String),

    /// A domain rule was violated (validation or an illegal status
    /// transition, which names both statuses of the rejected pair).
    #[error(transparent)]
    Domain(#[from] OrderError),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
