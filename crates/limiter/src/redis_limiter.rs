use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::bucket::{Bucket, RateKey};
use crate::limiter::{Decision, LimiterError, RateLimiter};

/// Mirrors `take_token` inside Redis so refill and decrement happen as
/// one atomic step across all API instances. Keys expire two full
/// windows after the last touch so idle clients cost nothing.
const TAKE_TOKEN_SCRIPT: &str = r#"
local state = redis.call('HMGET', KEYS[1], 'tokens', 'updated_ms')
local capacity = tonumber(ARGV[1])
local refill_per_ms = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])

local tokens = tonumber(state[1])
local updated_ms = tonumber(state[2])
if tokens == nil or updated_ms == nil then
    tokens = capacity
    updated_ms = now_ms
end

local elapsed = now_ms - updated_ms
if elapsed < 0 then
    elapsed = 0
end
tokens = tokens + elapsed * refill_per_ms
if tokens > capacity then
    tokens = capacity
end

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', KEYS[1], 'tokens', tokens, 'updated_ms', now_ms)
redis.call('PEXPIRE', KEYS[1], 120000)
return allowed
"#;

/// Shared limiter backed by Redis hashes, one per `(key, bucket)`.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn connect(url: &str) -> Result<Self, LimiterError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            script: Script::new(TAKE_TOKEN_SCRIPT),
        }
    }

    fn redis_key(key: &RateKey, bucket: Bucket) -> String {
        format!("ratelimit:{}:{key}", bucket.name())
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &RateKey, bucket: Bucket) -> Result<Decision, LimiterError> {
        let mut conn = self.conn.clone();
        let allowed: i64 = self
            .script
            .key(Self::redis_key(key, bucket))
            .arg(bucket.capacity())
            .arg(bucket.refill_per_ms())
            .arg(Self::now_ms())
            .invoke_async(&mut conn)
            .await?;

        Ok(if allowed == 1 {
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

    #[test]
    fn redis_key_embeds_bucket_and_caller() {
        assert_eq!(
            RedisRateLimiter::redis_key(&RateKey::User(UserId::new(42)), Bucket::CreateOrder),
            "ratelimit:create_order:user_42"
        );
        assert_eq!(
            RedisRateLimiter::redis_key(&RateKey::from_addr("10.0.0.1:9999"), Bucket::ListOrders),
            "ratelimit:list_orders:anon_10.0.0.1"
        );
    }
}
