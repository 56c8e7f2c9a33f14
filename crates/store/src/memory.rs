use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use domain::{LineItem, Money, Order, OrderError, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{OrderStore, UserRecord, UserStore},
};

/// In-memory store implementation for testing.
///
/// Mirrors the PostgreSQL backend's semantics: status transitions are
/// validated under the same write lock that commits them, and emails
/// are unique.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    users: Arc<RwLock<Vec<UserRecord>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        total_price: Money,
    ) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            user_id,
            items,
            total_price,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<_> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            }
            .into());
        }

        order.status = new_status;
        Ok(order.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryOrderStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<UserId> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail(email.to_string()));
        }

        let id = UserId::new(users.len() as i64 + 1);
        users.push(UserRecord {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        });
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn user_exists(&self, id: UserId) -> Result<bool> {
        Ok(self.users.read().await.iter().any(|u| u.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<LineItem> {
        vec![LineItem::new("X", 2)]
    }

    fn price() -> Money {
        Money::parse("19.98").unwrap()
    }

    #[tokio::test]
    async fn created_order_is_pending_with_exact_price() {
        let store = InMemoryOrderStore::new();
        let order = store.create(UserId::new(1), items(), price()).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price.cents(), 1998);

        let loaded = store.get(order.id).await.unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn get_unknown_order_fails_with_not_found() {
        let store = InMemoryOrderStore::new();
        let missing = OrderId::new();
        match store.get(missing).await {
            Err(StoreError::OrderNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected OrderNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_status_follows_transition_table() {
        let store = InMemoryOrderStore::new();
        let order = store.create(UserId::new(1), items(), price()).await.unwrap();

        let paid = store
            .update_status(order.id, OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);

        let shipped = store
            .update_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_and_status_unchanged() {
        let store = InMemoryOrderStore::new();
        let order = store.create(UserId::new(1), items(), price()).await.unwrap();

        match store.update_status(order.id, OrderStatus::Shipped).await {
            Err(StoreError::Domain(OrderError::InvalidTransition { from, to })) => {
                assert_eq!(from, OrderStatus::Pending);
                assert_eq!(to, OrderStatus::Shipped);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }

        assert_eq!(store.get(order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_status_admits_no_update() {
        let store = InMemoryOrderStore::new();
        let order = store.create(UserId::new(1), items(), price()).await.unwrap();
        store
            .update_status(order.id, OrderStatus::Canceled)
            .await
            .unwrap();

        for next in OrderStatus::all() {
            assert!(store.update_status(order.id, next).await.is_err());
        }
    }

    #[tokio::test]
    async fn list_by_user_is_newest_first_and_scoped() {
        let store = InMemoryOrderStore::new();
        let first = store.create(UserId::new(1), items(), price()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(UserId::new(1), items(), price()).await.unwrap();
        store.create(UserId::new(2), items(), price()).await.unwrap();

        let orders = store.list_by_user(UserId::new(1)).await.unwrap();
        assert_eq!(
            orders.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryOrderStore::new();
        store.insert_user("a@example.com", "hash1").await.unwrap();

        match store.insert_user("a@example.com", "hash2").await {
            Err(StoreError::DuplicateEmail(email)) => assert_eq!(email, "a@example.com"),
            other => panic!("expected DuplicateEmail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_lookup_roundtrip() {
        let store = InMemoryOrderStore::new();
        let id = store.insert_user("a@example.com", "hash").await.unwrap();

        assert!(store.user_exists(id).await.unwrap());
        assert!(!store.user_exists(UserId::new(999)).await.unwrap());

        let user = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "hash");
    }
}
