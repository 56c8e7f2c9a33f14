//! Shared identifier types used across the order pipeline crates.

mod types;

pub use types::{OrderId, UserId};
