//! Batch outcome aggregation.
//!
//! Whoever drives a job into a terminal state reports it here. Counters
//! only ever grow, so each terminal job is counted exactly once and the
//! batch settles when the last child lands.

use std::sync::Arc;

use tracing::{info, warn};

use sellsync_core::types::{BatchId, UserId};
use sellsync_core::{AppError, AppResult};
use sellsync_database::store::BatchStore;
use sellsync_entity::batch::{BatchJob, BatchOutcome, BatchStatus, CreateBatch};
use sellsync_entity::job::{Job, JobStatus, SubmitJob};

use crate::queue::JobQueue;

/// Tracks child outcomes and settles batches.
#[derive(Debug, Clone)]
pub struct BatchAggregator {
    store: Arc<dyn BatchStore>,
}

impl BatchAggregator {
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        Self { store }
    }

    /// Creates a batch and submits its children under it.
    ///
    /// Children must not carry idempotency keys: a coalesced child would
    /// already belong to another batch and this one could never settle.
    pub async fn submit_batch(
        &self,
        queue: &JobQueue,
        user_id: UserId,
        description: Option<String>,
        drafts: Vec<SubmitJob>,
    ) -> AppResult<(BatchJob, Vec<Job>)> {
        if drafts.iter().any(|draft| draft.idempotency_key.is_some()) {
            return Err(AppError::validation(
                "batch children must not carry idempotency keys",
            ));
        }

        let batch = self
            .store
            .create(&CreateBatch {
                user_id,
                description,
                total_count: drafts.len() as i32,
            })
            .await?;

        let mut jobs = Vec::with_capacity(drafts.len());
        for mut draft in drafts {
            draft.user_id = user_id;
            draft.batch_id = Some(batch.id);
            jobs.push(queue.submit(draft).await?.job);
        }

        info!(batch_id = %batch.id, children = jobs.len(), user_id = %user_id, "Batch submitted");
        Ok((batch, jobs))
    }

    /// Fetches a batch.
    pub async fn find(&self, id: BatchId) -> AppResult<Option<BatchJob>> {
        self.store.find_by_id(id).await
    }

    /// Records one child reaching a terminal state, settling the batch once
    /// every child has. Jobs without a batch pass through untouched, and an
    /// expired child counts as failed.
    pub async fn note_terminal(&self, job: &Job) -> AppResult<()> {
        let Some(batch_id) = job.batch_id else {
            return Ok(());
        };

        let outcome = match job.status {
            JobStatus::Completed => BatchOutcome::Completed,
            JobStatus::Failed | JobStatus::Expired => BatchOutcome::Failed,
            JobStatus::Cancelled => BatchOutcome::Cancelled,
            status => {
                warn!(
                    job_id = %job.id,
                    batch_id = %batch_id,
                    %status,
                    "Refusing to count a non-terminal job against its batch"
                );
                return Ok(());
            }
        };

        let Some(batch) = self.store.record_outcome(batch_id, outcome).await? else {
            warn!(job_id = %job.id, batch_id = %batch_id, "Job points at an unknown batch");
            return Ok(());
        };

        let derived = batch.derived_status();
        if derived != BatchStatus::Running && self.store.finalize(batch_id, derived).await? {
            info!(batch_id = %batch_id, status = %derived, "Batch settled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellsync_core::config::WorkerConfig;
    use sellsync_core::ErrorKind;
    use sellsync_database::memory::{MemoryBatchStore, MemoryJobStore};
    use sellsync_entity::action::{ActionType, Marketplace, Operation};

    fn make_fixture() -> (BatchAggregator, JobQueue) {
        let aggregator = BatchAggregator::new(Arc::new(MemoryBatchStore::new()));
        let queue = JobQueue::new(Arc::new(MemoryJobStore::new()), &WorkerConfig::default());
        (aggregator, queue)
    }

    fn make_draft(title: &str) -> SubmitJob {
        SubmitJob::new(
            UserId::new(),
            ActionType::new(Marketplace::Depop, Operation::Publish),
            serde_json::json!({"title": title}),
        )
    }

    #[tokio::test]
    async fn test_submit_batch_links_children() {
        let (aggregator, queue) = make_fixture();
        let user_id = UserId::new();

        let (batch, jobs) = aggregator
            .submit_batch(
                &queue,
                user_id,
                Some("bulk publish".to_string()),
                vec![make_draft("coat"), make_draft("boots"), make_draft("scarf")],
            )
            .await
            .unwrap();

        assert_eq!(batch.total_count, 3);
        assert_eq!(batch.status, BatchStatus::Running);
        assert_eq!(jobs.len(), 3);
        for job in &jobs {
            assert_eq!(job.batch_id, Some(batch.id));
            assert_eq!(job.user_id, user_id);
        }
    }

    #[tokio::test]
    async fn test_submit_batch_rejects_keyed_children() {
        let (aggregator, queue) = make_fixture();
        let mut keyed = make_draft("coat");
        keyed.idempotency_key = Some("publish_coat_1".to_string());

        let err = aggregator
            .submit_batch(&queue, UserId::new(), None, vec![keyed])
            .await
            .unwrap_err();
        assert!(err.is_kind(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_mixed_outcomes_settle_partially_failed() {
        let (aggregator, queue) = make_fixture();
        let (batch, jobs) = aggregator
            .submit_batch(
                &queue,
                UserId::new(),
                None,
                vec![make_draft("a"), make_draft("b"), make_draft("c")],
            )
            .await
            .unwrap();

        let mut done = jobs[0].clone();
        done.status = JobStatus::Completed;
        let mut failed = jobs[1].clone();
        failed.status = JobStatus::Failed;
        let mut cancelled = jobs[2].clone();
        cancelled.status = JobStatus::Cancelled;

        aggregator.note_terminal(&done).await.unwrap();
        let mid = aggregator.find(batch.id).await.unwrap().unwrap();
        assert_eq!(mid.status, BatchStatus::Running);

        aggregator.note_terminal(&failed).await.unwrap();
        aggregator.note_terminal(&cancelled).await.unwrap();

        let settled = aggregator.find(batch.id).await.unwrap().unwrap();
        assert_eq!(settled.status, BatchStatus::PartiallyFailed);
        assert_eq!(settled.completed_count, 1);
        assert_eq!(settled.failed_count, 1);
        assert_eq!(settled.cancelled_count, 1);
        assert!(settled.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_all_completed_settles_completed() {
        let (aggregator, queue) = make_fixture();
        let (batch, jobs) = aggregator
            .submit_batch(&queue, UserId::new(), None, vec![make_draft("a"), make_draft("b")])
            .await
            .unwrap();

        for job in &jobs {
            let mut done = job.clone();
            done.status = JobStatus::Completed;
            aggregator.note_terminal(&done).await.unwrap();
        }

        let settled = aggregator.find(batch.id).await.unwrap().unwrap();
        assert_eq!(settled.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_expired_child_counts_as_failed() {
        let (aggregator, queue) = make_fixture();
        let (batch, jobs) = aggregator
            .submit_batch(&queue, UserId::new(), None, vec![make_draft("a")])
            .await
            .unwrap();

        let mut expired = jobs[0].clone();
        expired.status = JobStatus::Expired;
        aggregator.note_terminal(&expired).await.unwrap();

        let settled = aggregator.find(batch.id).await.unwrap().unwrap();
        assert_eq!(settled.failed_count, 1);
        assert_eq!(settled.status, BatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_non_terminal_and_batchless_jobs_are_ignored() {
        let (aggregator, queue) = make_fixture();
        let (batch, jobs) = aggregator
            .submit_batch(&queue, UserId::new(), None, vec![make_draft("a")])
            .await
            .unwrap();

        // Still pending: nothing to count.
        aggregator.note_terminal(&jobs[0]).await.unwrap();
        let untouched = aggregator.find(batch.id).await.unwrap().unwrap();
        assert_eq!(untouched.settled_count(), 0);

        // No batch at all: passes through.
        let loose = queue.submit(make_draft("loose")).await.unwrap().job;
        let mut done = loose;
        done.status = JobStatus::Completed;
        aggregator.note_terminal(&done).await.unwrap();
    }
}
