//! Job table row and submission payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sellsync_core::types::{BatchId, JobId, UserId};

use crate::action::ActionType;
use crate::job::status::JobStatus;

/// A row of the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    /// Primary key.
    pub id: JobId,
    /// Owner of the job; remote commands go to this user's agent.
    pub user_id: UserId,
    /// Parent batch, if the job was submitted as part of one.
    pub batch_id: Option<BatchId>,
    /// Which remote command this job performs.
    pub action_type: ActionType,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Claim order; lower values are claimed first.
    pub priority: i32,
    /// Number of failed executions so far.
    pub retry_count: i32,
    /// Executions allowed before the job fails for good.
    pub max_retries: i32,
    /// Client-chosen deduplication key, unique among non-terminal jobs.
    pub idempotency_key: Option<String>,
    /// Handler input.
    pub input_data: serde_json::Value,
    /// Handler output, set on completion.
    pub result_data: Option<serde_json::Value>,
    /// Last failure description; always set on failed jobs.
    pub error_message: Option<String>,
    /// Earliest claim time; used for retry backoff.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the current or last execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Deadline after which a still-pending job expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set once the retention sweep hides the job from normal queries.
    pub archived_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// True once the job can never change status again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a failed execution may be retried.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Payload for submitting a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    /// Owner of the job.
    pub user_id: UserId,
    /// Parent batch, if any.
    pub batch_id: Option<BatchId>,
    /// Which remote command to perform.
    pub action_type: ActionType,
    /// Claim order; lower values are claimed first.
    pub priority: i32,
    /// Executions allowed before the job fails for good.
    pub max_retries: i32,
    /// Deduplication key; submissions sharing a key with a live job
    /// coalesce into that job instead of creating a new row.
    pub idempotency_key: Option<String>,
    /// Handler input.
    pub input_data: serde_json::Value,
    /// Optional queue deadline.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubmitJob {
    /// Builds a submission with default priority and retry budget.
    pub fn new(user_id: UserId, action_type: ActionType, input_data: serde_json::Value) -> Self {
        Self {
            user_id,
            batch_id: None,
            action_type,
            priority: 100,
            max_retries: 3,
            idempotency_key: None,
            input_data,
            expires_at: None,
        }
    }
}

/// Builds an idempotency key in the conventional
/// `<operation>_<entity_id>_<random>` form.
///
/// The random suffix keeps distinct logical submissions from colliding while
/// a client that resubmits the same key still coalesces.
pub fn suggested_idempotency_key(operation: &str, entity_id: &str) -> String {
    format!("{operation}_{entity_id}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Marketplace, Operation};

    #[test]
    fn test_submit_job_defaults() {
        let submit = SubmitJob::new(
            UserId::new(),
            ActionType::new(Marketplace::Vinted, Operation::Publish),
            serde_json::json!({"title": "wool coat"}),
        );
        assert_eq!(submit.priority, 100);
        assert_eq!(submit.max_retries, 3);
        assert!(submit.idempotency_key.is_none());
        assert!(submit.batch_id.is_none());
    }

    #[test]
    fn test_suggested_idempotency_key_shape() {
        let key = suggested_idempotency_key("publish", "listing-7");
        let mut parts = key.splitn(3, '_');
        assert_eq!(parts.next(), Some("publish"));
        assert_eq!(parts.next(), Some("listing-7"));
        let suffix = parts.next().unwrap();
        assert_eq!(suffix.len(), 32);

        assert_ne!(
            suggested_idempotency_key("publish", "listing-7"),
            suggested_idempotency_key("publish", "listing-7"),
        );
    }
}
