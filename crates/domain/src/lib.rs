//! Domain model for the order pipeline.
//!
//! Holds the order record and its value objects: the closed status
//! state machine, fixed-point money, line items, and the lifecycle
//! event emitted when an order is created. No I/O lives here; the
//! store, cache, and broker crates depend on these types.

mod error;
mod event;
mod money;
mod order;
mod status;

pub use error::OrderError;
pub use event::{EventKind, LifecycleEvent};
pub use money::Money;
pub use order::{LineItem, Order, validate_new_order};
pub use status::OrderStatus;
