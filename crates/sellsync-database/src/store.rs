//! Storage traits for jobs, batches, and orders.
//!
//! The Postgres implementations live in [`crate::repositories`] and the
//! in-memory implementations in [`crate::memory`]. Every method returns
//! `AppResult` and never leaks a raw uniqueness conflict: duplicate
//! submissions and concurrent upserts are part of the contract and are
//! resolved inside the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use sellsync_core::types::{BatchId, JobId, UserId};
use sellsync_core::AppResult;
use sellsync_entity::action::Marketplace;
use sellsync_entity::batch::{BatchJob, BatchOutcome, BatchStatus, CreateBatch};
use sellsync_entity::job::{Job, JobStatus, SubmitJob};
use sellsync_entity::order::{MarketplaceOrder, UpsertOrder};

/// Result of a job submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The stored job, freshly created or pre-existing.
    pub job: Job,
    /// True when the submission coalesced into a live job holding the same
    /// idempotency key instead of creating a new row.
    pub deduplicated: bool,
}

/// How [`OrderStore::upsert`] serializes concurrent writers on one natural
/// key. Both strategies give the same observable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertStrategy {
    /// Insert first and recover from the unique violation by updating the
    /// existing row. Cheapest when most orders are new.
    #[default]
    Optimistic,
    /// Take a per-key lock up front, then branch on existence. Avoids
    /// conflict churn when most orders are refreshes.
    Pessimistic,
}

/// Persistence for jobs and the claim queue.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug {
    /// Stores a new job, or returns the live job already holding the same
    /// idempotency key.
    async fn submit(&self, new: &SubmitJob) -> AppResult<SubmitOutcome>;

    /// Fetches a job by id.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Fetches all jobs belonging to a batch, oldest first.
    async fn find_by_batch(&self, batch_id: BatchId) -> AppResult<Vec<Job>>;

    /// Atomically claims the next due pending job, moving it to `running`
    /// and stamping `started_at`. Eligible jobs are ordered by priority,
    /// then submission time. Two concurrent claimers never get the same job.
    async fn claim_next(&self) -> AppResult<Option<Job>>;

    /// Marks a running job completed with its result. Returns `None` when
    /// the job is no longer running, in which case nothing changed.
    async fn mark_completed(&self, id: JobId, result: Option<&Value>) -> AppResult<Option<Job>>;

    /// Records a failed execution of a running job. With retries left the
    /// job goes back to `pending` with `retry_count` incremented and its
    /// next attempt delayed until `retry_at`; with the budget exhausted it
    /// fails terminally. Returns `None` when the job is no longer running.
    async fn record_failure(
        &self,
        id: JobId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Fails a running job outright, ignoring its remaining retry budget.
    async fn mark_failed(&self, id: JobId, error: &str) -> AppResult<Option<Job>>;

    /// Cancels a pending, running, or paused job. Cancelling a running job
    /// does not recall the in-flight remote command; it only suppresses
    /// retries and discards the eventual outcome.
    async fn cancel(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Pauses a pending job.
    async fn pause(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Returns a paused job to the queue.
    async fn resume(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Expires every pending job whose deadline has passed. Returns the
    /// expired jobs.
    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>>;

    /// Archives terminal jobs settled before `cutoff`. Returns how many
    /// were archived.
    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Counts unarchived jobs in the given status.
    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64>;
}

/// Persistence for batches.
#[async_trait]
pub trait BatchStore: Send + Sync + std::fmt::Debug {
    /// Creates a batch in `running` state with zeroed counters.
    async fn create(&self, new: &CreateBatch) -> AppResult<BatchJob>;

    /// Fetches a batch by id.
    async fn find_by_id(&self, id: BatchId) -> AppResult<Option<BatchJob>>;

    /// Adds one child outcome to the counters and returns the updated row.
    /// Returns `None` for an unknown batch.
    async fn record_outcome(
        &self,
        id: BatchId,
        outcome: BatchOutcome,
    ) -> AppResult<Option<BatchJob>>;

    /// Moves a batch from `running` to a terminal status. Returns false
    /// when the batch was already finalized, in which case nothing changed.
    async fn finalize(&self, id: BatchId, status: BatchStatus) -> AppResult<bool>;
}

/// Persistence for imported marketplace orders.
#[async_trait]
pub trait OrderStore: Send + Sync + std::fmt::Debug {
    /// Inserts the order, or refreshes the row already holding its natural
    /// key. Concurrent upserts of the same key converge to a single row.
    async fn upsert(
        &self,
        order: &UpsertOrder,
        strategy: UpsertStrategy,
    ) -> AppResult<MarketplaceOrder>;

    /// Fetches an order by its natural key.
    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        marketplace: Marketplace,
        external_id: &str,
    ) -> AppResult<Option<MarketplaceOrder>>;

    /// Counts orders stored for a user.
    async fn count_for_user(&self, user_id: UserId) -> AppResult<i64>;
}
