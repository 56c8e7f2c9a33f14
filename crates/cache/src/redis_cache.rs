use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::cache::{OrderCache, order_cache_key};
use crate::error::CacheError;

/// Redis-backed order cache.
///
/// Keys are `order:{orderId}` mapping to a JSON order snapshot with a
/// server-side TTL, so entries age out even if invalidation is missed.
#[derive(Clone)]
pub struct RedisOrderCache {
    conn: ConnectionManager,
}

impl RedisOrderCache {
    /// Connects to Redis and returns a cache handle.
    ///
    /// The connection manager reconnects transparently; the handle is
    /// cheap to clone and share.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Wraps an existing connection manager (used when the cache and
    /// rate-limit namespaces share one Redis instance).
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OrderCache for RedisOrderCache {
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, CacheError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(order_cache_key(order_id)).await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, order: &Order, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(order)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(order_cache_key(order.id), payload, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn invalidate(&self, order_id: OrderId) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(order_cache_key(order_id)).await?;
        Ok(())
    }
}
