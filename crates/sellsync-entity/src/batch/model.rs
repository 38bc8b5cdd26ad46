//! Batch table row and creation payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sellsync_core::types::{BatchId, UserId};

use crate::batch::status::BatchStatus;

/// A row of the `batch_jobs` table.
///
/// The counters only grow, and their sum never exceeds `total_count`; the
/// table enforces that with a CHECK constraint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BatchJob {
    /// Primary key.
    pub id: BatchId,
    /// Owner of every job in the batch.
    pub user_id: UserId,
    /// Free-form label, e.g. "relist winter catalog".
    pub description: Option<String>,
    /// Number of child jobs the batch was created with.
    pub total_count: i32,
    /// Children that completed successfully.
    pub completed_count: i32,
    /// Children that failed or expired.
    pub failed_count: i32,
    /// Children that were cancelled.
    pub cancelled_count: i32,
    /// Aggregate state derived from the counters.
    pub status: BatchStatus,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last counter or status update.
    pub updated_at: DateTime<Utc>,
    /// When the batch reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Number of children that have reached a terminal state.
    pub fn settled_count(&self) -> i32 {
        self.completed_count + self.failed_count + self.cancelled_count
    }

    /// True once every child is terminal.
    pub fn is_settled(&self) -> bool {
        self.settled_count() >= self.total_count
    }

    /// Recomputes the aggregate status from the current counters.
    pub fn derived_status(&self) -> BatchStatus {
        BatchStatus::derive(
            self.total_count,
            self.completed_count,
            self.failed_count,
            self.cancelled_count,
        )
    }
}

/// Payload for creating a new batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatch {
    /// Owner of the batch.
    pub user_id: UserId,
    /// Free-form label.
    pub description: Option<String>,
    /// Number of child jobs that will be submitted under this batch.
    pub total_count: i32,
}
