use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use tokio::sync::RwLock;

use crate::cache::OrderCache;
use crate::error::CacheError;

/// In-memory order cache for testing.
///
/// Honors TTLs so the read-through and expiry behavior can be tested
/// without a Redis instance.
#[derive(Clone, Default)]
pub struct InMemoryOrderCache {
    entries: Arc<RwLock<HashMap<OrderId, (Order, Instant)>>>,
}

impl InMemoryOrderCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    /// Returns true if no live entry exists.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderCache for InMemoryOrderCache {
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(&order_id) {
            Some((order, expires)) if *expires > Instant::now() => Ok(Some(order.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, order: &Order, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(order.id, (order.clone(), now + ttl));
        Ok(())
    }

    async fn invalidate(&self, order_id: OrderId) -> Result<(), CacheError> {
        self.entries.write().await.remove(&order_id);
        Ok(())
    }
}
