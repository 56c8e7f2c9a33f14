//! Cache-Aside Layer for order lookups.
//!
//! Reads go cache-first with a TTL-bounded copy; writes go through the
//! store and then overwrite (or invalidate) the cached entry before the
//! caller sees success, so a GET right after a PATCH never returns the
//! pre-update value.

mod cache;
mod error;
mod memory;
mod redis_cache;

pub use cache::{CachedOrders, ORDER_TTL, OrderCache, order_cache_key};
pub use error::CacheError;
pub use memory::InMemoryOrderCache;
pub use redis_cache::RedisOrderCache;
