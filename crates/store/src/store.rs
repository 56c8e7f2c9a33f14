use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{LineItem, Money, Order, OrderStatus};

use crate::Result;

/// Core trait for order store implementations.
///
/// `create` and `update_status` execute as single atomic transactions;
/// concurrent `update_status` calls on one order serialize through the
/// backend, and the loser of a race observes the committed state. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates an order owned by `user_id`.
    ///
    /// Assigns the order identifier, the initial `PENDING` status, and
    /// the server-side creation timestamp.
    async fn create(&self, user_id: UserId, items: Vec<LineItem>, total_price: Money)
        -> Result<Order>;

    /// Retrieves an order by ID, failing with `OrderNotFound` when the
    /// order does not exist.
    async fn get(&self, order_id: OrderId) -> Result<Order>;

    /// Retrieves all orders of a user, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Updates the status of an order.
    ///
    /// The transition table is checked once here, inside the same
    /// transaction that commits the update. An illegal pair fails with
    /// `InvalidTransition` and leaves the stored status unchanged.
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order>;
}

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
}

/// Core trait for user store implementations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user, failing with `DuplicateEmail` when the email
    /// is already registered. Emails are stored as given; callers
    /// normalize to lowercase before insertion.
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<UserId>;

    /// Looks up a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Returns true if a user with this ID exists. Token subjects are
    /// re-checked against the store before any order operation.
    async fn user_exists(&self, id: UserId) -> Result<bool>;
}
