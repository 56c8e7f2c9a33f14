use async_trait::async_trait;

use crate::bucket::{Bucket, RateKey};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A token was taken; the request may proceed.
    Allowed,
    /// The bucket is empty; the caller should reject with 429.
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("rate limiter backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Checks and consumes tokens for a `(key, bucket)` pair.
///
/// Implementations must make the read-refill-consume step atomic so
/// concurrent requests never over-admit past the bucket capacity.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &RateKey, bucket: Bucket) -> Result<Decision, LimiterError>;
}
