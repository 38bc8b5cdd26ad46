//! Postgres order store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use sellsync_core::types::UserId;
use sellsync_core::{AppError, AppResult, ErrorKind};
use sellsync_entity::action::Marketplace;
use sellsync_entity::order::{MarketplaceOrder, UpsertOrder};

use crate::repositories::is_unique_violation;
use crate::store::{OrderStore, UpsertStrategy};

const INSERT_ORDER: &str = r#"
INSERT INTO marketplace_orders (
    user_id, marketplace, external_id, status, buyer_username,
    total_cents, currency, raw_data, placed_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
RETURNING *
"#;

const UPDATE_ORDER: &str = r#"
UPDATE marketplace_orders
SET status = $4, buyer_username = $5, total_cents = $6, currency = $7,
    raw_data = $8, placed_at = $9, fetched_at = NOW(), updated_at = NOW()
WHERE user_id = $1 AND marketplace = $2 AND external_id = $3
RETURNING *
"#;

/// [`OrderStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Creates a store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row<'e, E>(&self, executor: E, order: &UpsertOrder) -> Result<MarketplaceOrder, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MarketplaceOrder>(INSERT_ORDER)
            .bind(order.user_id)
            .bind(order.marketplace)
            .bind(&order.external_id)
            .bind(&order.status)
            .bind(order.buyer_username.as_deref())
            .bind(order.total_cents)
            .bind(&order.currency)
            .bind(&order.raw_data)
            .bind(order.placed_at)
            .fetch_one(executor)
            .await
    }

    async fn update_row<'e, E>(&self, executor: E, order: &UpsertOrder) -> Result<Option<MarketplaceOrder>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MarketplaceOrder>(UPDATE_ORDER)
            .bind(order.user_id)
            .bind(order.marketplace)
            .bind(&order.external_id)
            .bind(&order.status)
            .bind(order.buyer_username.as_deref())
            .bind(order.total_cents)
            .bind(&order.currency)
            .bind(&order.raw_data)
            .bind(order.placed_at)
            .fetch_optional(executor)
            .await
    }

    /// Insert first; a unique violation means another writer won the race,
    /// so the update path takes over.
    async fn upsert_optimistic(&self, order: &UpsertOrder) -> AppResult<MarketplaceOrder> {
        match self.insert_row(&self.pool, order).await {
            Ok(row) => Ok(row),
            Err(e) if is_unique_violation(&e) => self
                .update_row(&self.pool, order)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to update order", e)
                })?
                .ok_or_else(|| AppError::conflict("Order row vanished during upsert")),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Database,
                "Failed to insert order",
                e,
            )),
        }
    }

    /// Serialize writers on the natural key up front, then branch on
    /// existence inside the transaction. The lock is an advisory key lock
    /// rather than `FOR UPDATE` because the row may not exist yet.
    async fn upsert_pessimistic(&self, order: &UpsertOrder) -> AppResult<MarketplaceOrder> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let lock_key = format!(
            "{}:{}:{}",
            order.user_id, order.marketplace, order.external_id
        );
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&lock_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to take order lock", e)
            })?;

        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM marketplace_orders
            WHERE user_id = $1 AND marketplace = $2 AND external_id = $3
            "#,
        )
        .bind(order.user_id)
        .bind(order.marketplace)
        .bind(&order.external_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check for order", e))?;

        let row = if existing > 0 {
            self.update_row(&mut *tx, order)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to update order", e)
                })?
                .ok_or_else(|| AppError::conflict("Order row vanished during upsert"))?
        } else {
            self.insert_row(&mut *tx, order).await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to insert order", e)
            })?
        };

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit order upsert", e)
        })?;

        Ok(row)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn upsert(
        &self,
        order: &UpsertOrder,
        strategy: UpsertStrategy,
    ) -> AppResult<MarketplaceOrder> {
        match strategy {
            UpsertStrategy::Optimistic => self.upsert_optimistic(order).await,
            UpsertStrategy::Pessimistic => self.upsert_pessimistic(order).await,
        }
    }

    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        marketplace: Marketplace,
        external_id: &str,
    ) -> AppResult<Option<MarketplaceOrder>> {
        sqlx::query_as::<_, MarketplaceOrder>(
            r#"
            SELECT * FROM marketplace_orders
            WHERE user_id = $1 AND marketplace = $2 AND external_id = $3
            "#,
        )
        .bind(user_id)
        .bind(marketplace)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch order", e))
    }

    async fn count_for_user(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM marketplace_orders WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count orders", e))
    }
}
