//! Postgres job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use sellsync_core::types::{BatchId, JobId};
use sellsync_core::{AppError, AppResult, ErrorKind};
use sellsync_entity::job::{Job, JobStatus, SubmitJob};

use crate::repositories::is_unique_violation;
use crate::store::{JobStore, SubmitOutcome};

/// [`JobStore`] backed by Postgres.
///
/// Claiming relies on `FOR UPDATE SKIP LOCKED` so concurrent workers never
/// receive the same job, and every transition guards on the current status
/// in its `WHERE` clause so a stale writer cannot move a settled job.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Creates a store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_live_by_key(&self, key: &str) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running', 'paused')
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to look up idempotency key", e)
        })
    }

    async fn insert(&self, new: &SubmitJob) -> Result<Job, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                user_id, batch_id, action_type, priority, max_retries,
                idempotency_key, input_data, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.batch_id)
        .bind(new.action_type)
        .bind(new.priority)
        .bind(new.max_retries)
        .bind(new.idempotency_key.as_deref())
        .bind(&new.input_data)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn submit(&self, new: &SubmitJob) -> AppResult<SubmitOutcome> {
        // A submission can race another holder of the same key in either
        // direction, so alternate lookup and insert until one sticks.
        for _ in 0..3 {
            if let Some(key) = new.idempotency_key.as_deref() {
                if let Some(existing) = self.find_live_by_key(key).await? {
                    debug!(job_id = %existing.id, key, "Submission coalesced into live job");
                    return Ok(SubmitOutcome {
                        job: existing,
                        deduplicated: true,
                    });
                }
            }

            match self.insert(new).await {
                Ok(job) => {
                    return Ok(SubmitOutcome {
                        job,
                        deduplicated: false,
                    })
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Database,
                        "Failed to insert job",
                        e,
                    ))
                }
            }
        }

        Err(AppError::conflict(
            "Job submission kept colliding on its idempotency key",
        ))
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch job", e))
    }

    async fn find_by_batch(&self, batch_id: BatchId) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE batch_id = $1 ORDER BY created_at ASC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fetch batch jobs", e))
    }

    async fn claim_next(&self) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'running', started_at = NOW(), updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                  AND archived_at IS NULL
                  AND (scheduled_at IS NULL OR scheduled_at <= NOW())
                  AND (expires_at IS NULL OR expires_at > NOW())
                ORDER BY priority ASC, created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim job", e))
    }

    async fn mark_completed(&self, id: JobId, result: Option<&Value>) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'completed', result_data = $2, error_message = NULL,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(result)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))
    }

    async fn record_failure(
        &self,
        id: JobId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        // One statement decides retry-or-fail from the old row values, so a
        // concurrent cancel or completion cannot slip in between.
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = CASE WHEN retry_count < max_retries
                              THEN 'pending'::job_status ELSE 'failed'::job_status END,
                retry_count = CASE WHEN retry_count < max_retries
                                   THEN retry_count + 1 ELSE retry_count END,
                scheduled_at = CASE WHEN retry_count < max_retries
                                    THEN $3 ELSE scheduled_at END,
                started_at = CASE WHEN retry_count < max_retries
                                  THEN NULL ELSE started_at END,
                completed_at = CASE WHEN retry_count < max_retries
                                    THEN NULL ELSE NOW() END,
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record job failure", e))
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = $2,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fail job", e))
    }

    async fn cancel(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'running', 'paused')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to cancel job", e))
    }

    async fn pause(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'paused', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to pause job", e))
    }

    async fn resume(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'pending', updated_at = NOW()
            WHERE id = $1 AND status = 'paused'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to resume job", e))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'expired', completed_at = NOW(), updated_at = NOW()
            WHERE status = 'pending'
              AND expires_at IS NOT NULL AND expires_at <= $1
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to expire jobs", e))
    }

    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET archived_at = NOW(), updated_at = NOW()
            WHERE archived_at IS NULL
              AND status IN ('completed', 'failed', 'cancelled', 'expired')
              AND completed_at IS NOT NULL AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to archive jobs", e))?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE status = $1 AND archived_at IS NULL",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }
}
