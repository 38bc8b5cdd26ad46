//! In-memory batch store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use sellsync_core::types::BatchId;
use sellsync_core::{AppError, AppResult};
use sellsync_entity::batch::{BatchJob, BatchOutcome, BatchStatus, CreateBatch};

use crate::store::BatchStore;

/// [`BatchStore`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryBatchStore {
    batches: RwLock<HashMap<BatchId, BatchJob>>,
}

impl MemoryBatchStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for MemoryBatchStore {
    async fn create(&self, new: &CreateBatch) -> AppResult<BatchJob> {
        let now = Utc::now();
        let batch = BatchJob {
            id: BatchId::new(),
            user_id: new.user_id,
            description: new.description.clone(),
            total_count: new.total_count,
            completed_count: 0,
            failed_count: 0,
            cancelled_count: 0,
            status: BatchStatus::Running,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.batches.write().await.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn find_by_id(&self, id: BatchId) -> AppResult<Option<BatchJob>> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn record_outcome(
        &self,
        id: BatchId,
        outcome: BatchOutcome,
    ) -> AppResult<Option<BatchJob>> {
        let mut batches = self.batches.write().await;
        let Some(batch) = batches.get_mut(&id) else {
            return Ok(None);
        };
        // Same guard the CHECK constraint provides in Postgres.
        if batch.settled_count() >= batch.total_count {
            return Err(AppError::conflict(
                "Batch counters would exceed the batch total",
            ));
        }

        match outcome {
            BatchOutcome::Completed => batch.completed_count += 1,
            BatchOutcome::Failed => batch.failed_count += 1,
            BatchOutcome::Cancelled => batch.cancelled_count += 1,
        }
        batch.updated_at = Utc::now();
        Ok(Some(batch.clone()))
    }

    async fn finalize(&self, id: BatchId, status: BatchStatus) -> AppResult<bool> {
        let mut batches = self.batches.write().await;
        let Some(batch) = batches.get_mut(&id) else {
            return Ok(false);
        };
        if batch.status != BatchStatus::Running {
            return Ok(false);
        }

        let now = Utc::now();
        batch.status = status;
        batch.completed_at = Some(now);
        batch.updated_at = now;
        Ok(true)
    }
}
