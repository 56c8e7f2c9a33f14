use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::bucket::{Bucket, BucketState, RateKey, take_token};
use crate::limiter::{Decision, LimiterError, RateLimiter};

/// Process-local limiter keeping bucket state in a mutex-guarded map.
///
/// Suitable for tests and single-process deployments; state is lost on
/// restart and not shared across instances.
pub struct InMemoryRateLimiter {
    started: Instant,
    offset: Mutex<Duration>,
    buckets: Mutex<HashMap<(RateKey, Bucket), BucketState>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Shifts the limiter's clock forward. Test-only time travel so
    /// refill behavior can be checked without sleeping.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    fn now_ms(&self) -> u64 {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        (self.started.elapsed() + offset).as_millis() as u64
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn allow(&self, key: &RateKey, bucket: Bucket) -> Result<Decision, LimiterError> {
        let now_ms = self.now_ms();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let slot = buckets.get(&(key.clone(), bucket)).copied();
        let (state, allowed) = take_token(slot, bucket.capacity(), bucket.refill_per_ms(), now_ms);
        buckets.insert((key.clone(), bucket), state);
        Ok(if allowed {
            Decision::Allowed
        } else {
            Decision::Denied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;

    async fn drain(limiter: &InMemoryRateLimiter, key: &RateKey, bucket: Bucket) {
        for _ in 0..bucket.capacity() {
            let decision = limiter.allow(key, bucket).await.unwrap();
            assert_eq!(decision, Decision::Allowed);
        }
    }

    #[tokio::test]
    async fn denies_once_bucket_is_empty() {
        let limiter = InMemoryRateLimiter::new();
        let key = RateKey::User(UserId::new(7));

        drain(&limiter, &key, Bucket::CreateOrder).await;
        let decision = limiter.allow(&key, Bucket::CreateOrder).await.unwrap();
        assert_eq!(decision, Decision::Denied);
    }

    #[tokio::test]
    async fn refills_after_the_window_elapses() {
        let limiter = InMemoryRateLimiter::new();
        let key = RateKey::User(UserId::new(7));

        drain(&limiter, &key, Bucket::CreateOrder).await;
        assert_eq!(
            limiter.allow(&key, Bucket::CreateOrder).await.unwrap(),
            Decision::Denied
        );

        limiter.advance(Duration::from_secs(60));
        drain(&limiter, &key, Bucket::CreateOrder).await;
        assert_eq!(
            limiter.allow(&key, Bucket::CreateOrder).await.unwrap(),
            Decision::Denied
        );
    }

    #[tokio::test]
    async fn partial_refill_grants_partial_budget() {
        let limiter = InMemoryRateLimiter::new();
        let key = RateKey::User(UserId::new(7));

        drain(&limiter, &key, Bucket::CreateOrder).await;

        // 24s at 5 tokens/minute refills exactly two tokens.
        limiter.advance(Duration::from_secs(24));
        assert_eq!(
            limiter.allow(&key, Bucket::CreateOrder).await.unwrap(),
            Decision::Allowed
        );
        assert_eq!(
            limiter.allow(&key, Bucket::CreateOrder).await.unwrap(),
            Decision::Allowed
        );
        assert_eq!(
            limiter.allow(&key, Bucket::CreateOrder).await.unwrap(),
            Decision::Denied
        );
    }

    #[tokio::test]
    async fn buckets_are_independent_per_operation() {
        let limiter = InMemoryRateLimiter::new();
        let key = RateKey::User(UserId::new(7));

        drain(&limiter, &key, Bucket::CreateOrder).await;
        assert_eq!(
            limiter.allow(&key, Bucket::GetOrder).await.unwrap(),
            Decision::Allowed
        );
    }

    #[tokio::test]
    async fn buckets_are_independent_per_key() {
        let limiter = InMemoryRateLimiter::new();

        drain(
            &limiter,
            &RateKey::User(UserId::new(1)),
            Bucket::CreateOrder,
        )
        .await;
        assert_eq!(
            limiter
                .allow(&RateKey::User(UserId::new(2)), Bucket::CreateOrder)
                .await
                .unwrap(),
            Decision::Allowed
        );
        assert_eq!(
            limiter
                .allow(&RateKey::from_addr("10.0.0.1:4000"), Bucket::CreateOrder)
                .await
                .unwrap(),
            Decision::Allowed
        );
    }
}
