//! Order Store Adapter: durable create/read/update for orders and users.
//!
//! The store is the source of truth and the sole point of mutual
//! exclusion for order mutation. Two backends share one trait pair:
//! [`PostgresOrderStore`] for production and [`InMemoryOrderStore`]
//! with identical semantics for tests.

mod error;
mod memory;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{OrderStore, UserRecord, UserStore};
