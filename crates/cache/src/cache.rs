use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{LineItem, Money, Order, OrderStatus};
use store::OrderStore;

use crate::error::CacheError;

/// Fixed time-to-live for cached order snapshots.
pub const ORDER_TTL: Duration = Duration::from_secs(300);

/// Cache key for an order snapshot.
pub fn order_cache_key(order_id: OrderId) -> String {
    format!("order:{order_id}")
}

/// Core trait for order cache implementations.
///
/// Entries are non-authoritative, TTL-bounded copies of store rows.
#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Looks up a cached order. `Ok(None)` is a miss.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, CacheError>;

    /// Stores an order snapshot with the given TTL.
    async fn put(&self, order: &Order, ttl: Duration) -> Result<(), CacheError>;

    /// Removes an order snapshot.
    async fn invalidate(&self, order_id: OrderId) -> Result<(), CacheError>;
}

/// Read-through/write-through facade combining the durable store with
/// an order cache.
///
/// All order access in the request path and the background executor
/// goes through this type, so every status update keeps the cache
/// consistent with the store.
#[derive(Clone)]
pub struct CachedOrders {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    ttl: Duration,
}

impl CachedOrders {
    /// Creates a facade with the default 300 second TTL.
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<dyn OrderCache>) -> Self {
        Self::with_ttl(store, cache, ORDER_TTL)
    }

    /// Creates a facade with an explicit TTL (tests use short ones).
    pub fn with_ttl(store: Arc<dyn OrderStore>, cache: Arc<dyn OrderCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Creates an order in the store. Created orders are not cached
    /// eagerly; the first read populates the entry.
    pub async fn create(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        total_price: Money,
    ) -> store::Result<Order> {
        self.store.create(user_id, items, total_price).await
    }

    /// Read path: cache hit returns without touching the store; a miss
    /// loads from the store and populates the cache with the TTL.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: OrderId) -> store::Result<Order> {
        match self.cache.get(order_id).await {
            Ok(Some(order)) => {
                metrics::counter!("cache_order_hits_total").increment(1);
                return Ok(order);
            }
            Ok(None) => {
                metrics::counter!("cache_order_misses_total").increment(1);
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "cache read failed, falling back to store");
            }
        }

        let order = self.store.get(order_id).await?;
        if let Err(e) = self.cache.put(&order, self.ttl).await {
            tracing::warn!(%order_id, error = %e, "failed to populate cache");
        }
        Ok(order)
    }

    /// Lists a user's orders, newest first. Not cached: lists change on
    /// every creation and the store query is indexed.
    pub async fn list_by_user(&self, user_id: UserId) -> store::Result<Vec<Order>> {
        self.store.list_by_user(user_id).await
    }

    /// Write path: the store commits the transition, then the cached
    /// entry is overwritten with the fresh value. If the overwrite
    /// fails the entry is invalidated instead, so a stale snapshot
    /// never outlives the update.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> store::Result<Order> {
        let order = self.store.update_status(order_id, new_status).await?;

        if let Err(e) = self.cache.put(&order, self.ttl).await {
            tracing::warn!(%order_id, error = %e, "write-through failed, invalidating entry");
            if let Err(e) = self.cache.invalidate(order_id).await {
                tracing::error!(%order_id, error = %e, "cache invalidation failed; entry expires with TTL");
            }
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use store::{InMemoryOrderStore, StoreError};

    use super::*;
    use crate::memory::InMemoryOrderCache;

    /// Store wrapper that counts reads, to prove cache hits skip it.
    struct CountingStore {
        inner: InMemoryOrderStore,
        gets: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryOrderStore::new(),
                gets: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderStore for CountingStore {
        async fn create(
            &self,
            user_id: UserId,
            items: Vec<LineItem>,
            total_price: Money,
        ) -> store::Result<Order> {
            self.inner.create(user_id, items, total_price).await
        }

        async fn get(&self, order_id: OrderId) -> store::Result<Order> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(order_id).await
        }

        async fn list_by_user(&self, user_id: UserId) -> store::Result<Vec<Order>> {
            self.inner.list_by_user(user_id).await
        }

        async fn update_status(
            &self,
            order_id: OrderId,
            new_status: OrderStatus,
        ) -> store::Result<Order> {
            self.inner.update_status(order_id, new_status).await
        }
    }

    /// Cache stub whose writes always fail, to exercise the
    /// invalidate-on-failure path.
    struct BrokenWrites {
        inner: InMemoryOrderCache,
    }

    #[async_trait]
    impl OrderCache for BrokenWrites {
        async fn get(&self, order_id: OrderId) -> Result<Option<Order>, CacheError> {
            self.inner.get(order_id).await
        }

        async fn put(&self, _order: &Order, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Serialization(serde_json::Error::io(
                std::io::Error::other("write refused"),
            )))
        }

        async fn invalidate(&self, order_id: OrderId) -> Result<(), CacheError> {
            self.inner.invalidate(order_id).await
        }
    }

    fn facade_with(store: Arc<dyn OrderStore>, cache: Arc<dyn OrderCache>) -> CachedOrders {
        CachedOrders::new(store, cache)
    }

    async fn seed_order(orders: &CachedOrders) -> Order {
        orders
            .create(
                UserId::new(1),
                vec![LineItem::new("X", 2)],
                Money::parse("19.98").unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn hit_returns_without_touching_the_store() {
        let store = Arc::new(CountingStore::new());
        let orders = facade_with(store.clone(), Arc::new(InMemoryOrderCache::new()));
        let order = seed_order(&orders).await;

        // Miss populates, hit is served from cache.
        orders.get(order.id).await.unwrap();
        orders.get(order.id).await.unwrap();
        orders.get(order.id).await.unwrap();

        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn price_survives_the_cache_roundtrip() {
        let orders = facade_with(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderCache::new()),
        );
        let order = seed_order(&orders).await;

        orders.get(order.id).await.unwrap();
        let cached = orders.get(order.id).await.unwrap();
        assert_eq!(cached.total_price.cents(), 1998);
        assert_eq!(cached.total_price.to_string(), "19.98");
    }

    #[tokio::test]
    async fn read_after_write_never_sees_the_old_status() {
        let orders = facade_with(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderCache::new()),
        );
        let order = seed_order(&orders).await;

        // Populate the cache with the PENDING snapshot first.
        assert_eq!(orders.get(order.id).await.unwrap().status, OrderStatus::Pending);

        orders
            .update_status(order.id, OrderStatus::Paid)
            .await
            .unwrap();

        assert_eq!(orders.get(order.id).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn failed_write_through_invalidates_instead_of_leaving_stale() {
        let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let inner = InMemoryOrderCache::new();
        let orders_direct = facade_with(store.clone(), Arc::new(inner.clone()));
        let order = seed_order(&orders_direct).await;

        // Seed a PENDING snapshot, then update through a facade whose
        // cache writes fail.
        orders_direct.get(order.id).await.unwrap();
        let broken = facade_with(store, Arc::new(BrokenWrites { inner: inner.clone() }));
        broken
            .update_status(order.id, OrderStatus::Paid)
            .await
            .unwrap();

        assert_eq!(inner.get(order.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_read_failure_degrades_to_store() {
        struct BrokenReads;

        #[async_trait]
        impl OrderCache for BrokenReads {
            async fn get(&self, _order_id: OrderId) -> Result<Option<Order>, CacheError> {
                Err(CacheError::Serialization(serde_json::Error::io(
                    std::io::Error::other("read refused"),
                )))
            }

            async fn put(&self, _order: &Order, _ttl: Duration) -> Result<(), CacheError> {
                Ok(())
            }

            async fn invalidate(&self, _order_id: OrderId) -> Result<(), CacheError> {
                Ok(())
            }
        }

        let orders = facade_with(Arc::new(InMemoryOrderStore::new()), Arc::new(BrokenReads));
        let order = seed_order(&orders).await;
        assert_eq!(orders.get(order.id).await.unwrap().id, order.id);
    }

    #[tokio::test]
    async fn missing_order_propagates_not_found() {
        let orders = facade_with(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryOrderCache::new()),
        );
        assert!(matches!(
            orders.get(OrderId::new()).await,
            Err(StoreError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let store = Arc::new(CountingStore::new());
        let orders = CachedOrders::with_ttl(
            store.clone(),
            Arc::new(InMemoryOrderCache::new()),
            Duration::from_millis(10),
        );
        let order = seed_order(&orders).await;

        orders.get(order.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        orders.get(order.id).await.unwrap();

        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_key_format() {
        let id = OrderId::new();
        assert_eq!(order_cache_key(id), format!("order:{id}"));
    }
}
