//! Per-key token-bucket rate limiting, applied ahead of every order
//! operation.
//!
//! Each `(key, bucket)` pair is an independent bucket: a capacity of
//! tokens refilled continuously over time, consumed one per allowed
//! request. The check is a single atomic check-and-decrement; the
//! limiter never blocks and never leaves a bucket half-updated.

mod bucket;
mod limiter;
mod memory;
mod redis_limiter;

pub use bucket::{Bucket, BucketState, RateKey, take_token};
pub use limiter::{Decision, LimiterError, RateLimiter};
pub use memory::InMemoryRateLimiter;
pub use redis_limiter::RedisRateLimiter;
