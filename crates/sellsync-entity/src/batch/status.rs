//! Batch aggregate states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregate state of a [`super::BatchJob`], derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "batch_status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least one child job is still live.
    Running,
    /// Every child succeeded.
    Completed,
    /// Some children succeeded, some did not.
    PartiallyFailed,
    /// No child succeeded and at least one failed.
    Failed,
    /// Every child was cancelled.
    Cancelled,
}

impl BatchStatus {
    /// True once the batch can never change status again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::Running)
    }

    /// Lowercase name as stored in Postgres.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::PartiallyFailed => "partially_failed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    /// Derives the aggregate status from a batch's counters.
    ///
    /// Returns [`BatchStatus::Running`] while any child is unsettled. Once
    /// every child is terminal: all successes is `Completed`, a mix with at
    /// least one success is `PartiallyFailed`, all cancellations is
    /// `Cancelled`, and anything else with no successes is `Failed`.
    pub fn derive(total: i32, completed: i32, failed: i32, cancelled: i32) -> Self {
        if completed + failed + cancelled < total {
            return BatchStatus::Running;
        }
        if completed == total {
            BatchStatus::Completed
        } else if completed > 0 {
            BatchStatus::PartiallyFailed
        } else if cancelled == total {
            BatchStatus::Cancelled
        } else {
            BatchStatus::Failed
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a single child job, as reported to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    /// The child completed successfully.
    Completed,
    /// The child failed or expired.
    Failed,
    /// The child was cancelled.
    Cancelled,
}
