use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{LineItem, Money, Order, OrderError, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{OrderStore, UserRecord, UserStore},
};

/// PostgreSQL-backed store for orders and users.
///
/// Issues only parameterized queries. Order mutation goes through
/// explicit transactions; `update_status` takes a row lock so that
/// concurrent updates on the same order serialize.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let items_json: serde_json::Value = row.try_get("items")?;
        let items: Vec<LineItem> = serde_json::from_value(items_json)?;

        let status_str: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown order status {status_str:?}").into(),
            ))
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            items,
            total_price: Money::from_cents(row.try_get("total_price_cents")?)?,
            status,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, items))]
    async fn create(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        total_price: Money,
    ) -> Result<Order> {
        let order_id = OrderId::new();
        let items_json = serde_json::to_value(&items)?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, items, total_price_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_i64())
        .bind(&items_json)
        .bind(total_price.cents())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        tx.commit().await?;

        metrics::counter!("store_orders_created_total").increment(1);

        Ok(Order {
            id: order_id,
            user_id,
            items,
            total_price,
            status: OrderStatus::Pending,
            created_at,
        })
    }

    async fn get(&self, order_id: OrderId) -> Result<Order> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, total_price_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_order(row),
            None => Err(StoreError::OrderNotFound(order_id)),
        }
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, total_price_cents, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent update on the same order waits here and
        // then revalidates against the committed status.
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, total_price_cents, status, created_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let order = match row {
            Some(row) => Self::row_to_order(row)?,
            None => return Err(StoreError::OrderNotFound(order_id)),
        };

        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            }
            .into());
        }

        sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(new_status.as_str())
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Order {
            status: new_status,
            ..order
        })
    }
}

#[async_trait]
impl UserStore for PostgresOrderStore {
    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<UserId> {
        let row = sqlx::query("INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id")
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("users_email_key")
                {
                    return StoreError::DuplicateEmail(email.to_string());
                }
                StoreError::Database(e)
            })?;

        Ok(UserId::new(row.try_get("id")?))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserRecord {
                id: UserId::new(row.try_get("id")?),
                email: row.try_get("email")?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn user_exists(&self, id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_i64())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
