//! Job queue facade over the job store.
//!
//! Thin lifecycle layer: submission with idempotent coalescing, claiming,
//! terminal transitions, and the retry backoff policy. All state lives in
//! the store; this type only decides what to ask it for.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use sellsync_core::config::WorkerConfig;
use sellsync_core::types::JobId;
use sellsync_core::{AppError, AppResult};
use sellsync_database::store::{JobStore, SubmitOutcome};
use sellsync_entity::job::{Job, JobStatus, SubmitJob};

/// Queue counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub paused: i64,
    pub failed: i64,
}

/// Submission, claiming, and lifecycle transitions for jobs.
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, config: &WorkerConfig) -> Self {
        Self {
            store,
            backoff_base: Duration::from_secs(config.retry_backoff_base_seconds),
            backoff_cap: Duration::from_secs(config.retry_backoff_cap_seconds),
        }
    }

    /// Submits a job. A submission whose idempotency key matches a live job
    /// returns that job instead of creating a second one.
    pub async fn submit(&self, new: SubmitJob) -> AppResult<SubmitOutcome> {
        let outcome = self.store.submit(&new).await?;
        if outcome.deduplicated {
            debug!(
                job_id = %outcome.job.id,
                action = %outcome.job.action_type,
                "Submission coalesced into an existing job"
            );
        } else {
            info!(
                job_id = %outcome.job.id,
                action = %outcome.job.action_type,
                user_id = %outcome.job.user_id,
                "Job submitted"
            );
        }
        Ok(outcome)
    }

    /// Claims the next due job, if any.
    pub async fn claim(&self) -> AppResult<Option<Job>> {
        let claimed = self.store.claim_next().await?;
        if let Some(job) = &claimed {
            debug!(job_id = %job.id, action = %job.action_type, "Job claimed");
        }
        Ok(claimed)
    }

    /// Fetches a job.
    pub async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        self.store.find_by_id(id).await
    }

    /// Completes a running job. Returns `None` when the job already left
    /// the running state, e.g. through a concurrent cancellation; the
    /// result is discarded in that case.
    pub async fn complete(&self, id: JobId, result: Option<&Value>) -> AppResult<Option<Job>> {
        self.store.mark_completed(id, result).await
    }

    /// Records a retryable failure. With budget left the job goes back to
    /// pending behind an exponential backoff; otherwise it fails for good.
    /// The returned job's status says which happened.
    pub async fn fail_retryable(&self, job: &Job, error: &str) -> AppResult<Option<Job>> {
        let retry_at = Utc::now() + self.backoff_delay(job.retry_count);
        self.store.record_failure(job.id, error, retry_at).await
    }

    /// Fails a running job with no retry, whatever budget it has left.
    pub async fn fail_fatal(&self, id: JobId, error: &str) -> AppResult<Option<Job>> {
        self.store.mark_failed(id, error).await
    }

    /// Cancels a job that has not settled yet.
    pub async fn cancel(&self, id: JobId) -> AppResult<Job> {
        if let Some(job) = self.store.cancel(id).await? {
            info!(job_id = %job.id, "Job cancelled");
            return Ok(job);
        }
        self.transition_refused(id, "cancelled").await
    }

    /// Takes a pending job out of the queue without discarding it.
    pub async fn pause(&self, id: JobId) -> AppResult<Job> {
        if let Some(job) = self.store.pause(id).await? {
            info!(job_id = %job.id, "Job paused");
            return Ok(job);
        }
        self.transition_refused(id, "paused").await
    }

    /// Returns a paused job to the queue.
    pub async fn resume(&self, id: JobId) -> AppResult<Job> {
        if let Some(job) = self.store.resume(id).await? {
            info!(job_id = %job.id, "Job resumed");
            return Ok(job);
        }
        self.transition_refused(id, "resumed").await
    }

    /// Expires overdue pending jobs, returning them for batch accounting.
    pub async fn expire_due(&self) -> AppResult<Vec<Job>> {
        let expired = self.store.expire_due(Utc::now()).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired overdue jobs");
        }
        Ok(expired)
    }

    /// Archives terminal jobs older than the retention window. Returns how
    /// many rows were hidden.
    pub async fn archive_older_than(&self, retention_days: u32) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
        let archived = self.store.archive_terminal_before(cutoff).await?;
        if archived > 0 {
            info!(archived, "Archived terminal jobs past retention");
        }
        Ok(archived)
    }

    /// Current queue counters.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            pending: self.store.count_by_status(JobStatus::Pending).await?,
            running: self.store.count_by_status(JobStatus::Running).await?,
            paused: self.store.count_by_status(JobStatus::Paused).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
        })
    }

    /// Distinguishes "no such job" from "job exists but its status refuses
    /// the transition" after a guarded update matched nothing.
    async fn transition_refused(&self, id: JobId, verb: &str) -> AppResult<Job> {
        match self.store.find_by_id(id).await? {
            Some(job) => Err(AppError::conflict(format!(
                "job {id} cannot be {verb} from status {}",
                job.status
            ))),
            None => Err(AppError::not_found(format!("job {id} does not exist"))),
        }
    }

    fn backoff_delay(&self, retry_count: i32) -> chrono::Duration {
        let exponent = retry_count.clamp(0, 16) as u32;
        let secs = self
            .backoff_base
            .as_secs()
            .saturating_mul(1u64 << exponent)
            .min(self.backoff_cap.as_secs());
        chrono::Duration::seconds(secs as i64)
    }
}
