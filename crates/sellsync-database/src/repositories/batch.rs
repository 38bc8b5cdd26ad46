//! Postgres batch store.

use async_trait::async_trait;
use sqlx::PgPool;

use sellsync_core::types::BatchId;
use sellsync_core::{AppError, AppResult, ErrorKind};
use sellsync_entity::batch::{BatchJob, BatchOutcome, BatchStatus, CreateBatch};

use crate::store::BatchStore;

/// [`BatchStore`] backed by Postgres.
///
/// Counter increments run as single `UPDATE` statements, so the row lock
/// serializes concurrent children and the CHECK constraint on the table
/// keeps the counters from ever exceeding `total_count`.
#[derive(Debug, Clone)]
pub struct PgBatchStore {
    pool: PgPool,
}

impl PgBatchStore {
    /// Creates a store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn create(&self, new: &CreateBatch) -> AppResult<BatchJob> {
        sqlx::query_as::<_, BatchJob>(
            r#"
            INSERT INTO batch_jobs (user_id, description, total_count)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.description.as_deref())
        .bind(new.total_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create batch", e))
    }

    async fn find_by_id(&self, id: BatchId) -> AppResult<Option<BatchJob>> {
        sqlx::query_as::<_, BatchJob>("SELECT * FROM batch_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch batch", e))
    }

    async fn record_outcome(
        &self,
        id: BatchId,
        outcome: BatchOutcome,
    ) -> AppResult<Option<BatchJob>> {
        let column = match outcome {
            BatchOutcome::Completed => "completed_count",
            BatchOutcome::Failed => "failed_count",
            BatchOutcome::Cancelled => "cancelled_count",
        };
        let sql = format!(
            "UPDATE batch_jobs SET {column} = {column} + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING *"
        );

        sqlx::query_as::<_, BatchJob>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to record batch outcome", e)
            })
    }

    async fn finalize(&self, id: BatchId, status: BatchStatus) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to finalize batch", e))?;

        Ok(result.rows_affected() == 1)
    }
}
