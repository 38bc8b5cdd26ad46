//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use sellsync_core::types::{BatchId, JobId};
use sellsync_core::AppResult;
use sellsync_entity::job::{Job, JobStatus, SubmitJob};

use crate::store::{JobStore, SubmitOutcome};

/// [`JobStore`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_claimable(job: &Job, now: DateTime<Utc>) -> bool {
    job.status == JobStatus::Pending
        && job.archived_at.is_none()
        && job.scheduled_at.is_none_or(|at| at <= now)
        && job.expires_at.is_none_or(|at| at > now)
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, new: &SubmitJob) -> AppResult<SubmitOutcome> {
        let mut jobs = self.jobs.write().await;

        if let Some(key) = new.idempotency_key.as_deref() {
            let live = jobs
                .values()
                .find(|j| !j.is_terminal() && j.idempotency_key.as_deref() == Some(key));
            if let Some(existing) = live {
                return Ok(SubmitOutcome {
                    job: existing.clone(),
                    deduplicated: true,
                });
            }
        }

        let now = Utc::now();
        let job = Job {
            id: JobId::new(),
            user_id: new.user_id,
            batch_id: new.batch_id,
            action_type: new.action_type,
            status: JobStatus::Pending,
            priority: new.priority,
            retry_count: 0,
            max_retries: new.max_retries,
            idempotency_key: new.idempotency_key.clone(),
            input_data: new.input_data.clone(),
            result_data: None,
            error_message: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            expires_at: new.expires_at,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };
        jobs.insert(job.id, job.clone());

        Ok(SubmitOutcome {
            job,
            deduplicated: false,
        })
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_by_batch(&self, batch_id: BatchId) -> AppResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut found: Vec<Job> = jobs
            .values()
            .filter(|j| j.batch_id == Some(batch_id))
            .cloned()
            .collect();
        found.sort_by_key(|j| j.created_at);
        Ok(found)
    }

    async fn claim_next(&self) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();

        let candidate = jobs
            .values()
            .filter(|j| is_claimable(j, now))
            .min_by_key(|j| (j.priority, j.created_at))
            .map(|j| j.id);

        let Some(id) = candidate else {
            return Ok(None);
        };
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };

        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_completed(&self, id: JobId, result: Option<&Value>) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Running {
            return Ok(None);
        }

        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.result_data = result.cloned();
        job.error_message = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn record_failure(
        &self,
        id: JobId,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Running {
            return Ok(None);
        }

        let now = Utc::now();
        if job.retry_count < job.max_retries {
            job.status = JobStatus::Pending;
            job.retry_count += 1;
            job.scheduled_at = Some(retry_at);
            job.started_at = None;
            job.completed_at = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(now);
        }
        job.error_message = Some(error.to_string());
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Running {
            return Ok(None);
        }

        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn cancel(&self, id: JobId) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !matches!(
            job.status,
            JobStatus::Pending | JobStatus::Running | JobStatus::Paused
        ) {
            return Ok(None);
        }

        let now = Utc::now();
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn pause(&self, id: JobId) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Pending {
            return Ok(None);
        }

        job.status = JobStatus::Paused;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn resume(&self, id: JobId) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Paused {
            return Ok(None);
        }

        job.status = JobStatus::Pending;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let mut jobs = self.jobs.write().await;
        let mut expired = Vec::new();
        for job in jobs.values_mut() {
            if job.status == JobStatus::Pending && job.expires_at.is_some_and(|at| at <= now) {
                job.status = JobStatus::Expired;
                job.completed_at = Some(now);
                job.updated_at = now;
                expired.push(job.clone());
            }
        }
        Ok(expired)
    }

    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let mut archived = 0;
        for job in jobs.values_mut() {
            if job.is_terminal()
                && job.archived_at.is_none()
                && job.completed_at.is_some_and(|at| at < cutoff)
            {
                job.archived_at = Some(now);
                job.updated_at = now;
                archived += 1;
            }
        }
        Ok(archived)
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.status == status && j.archived_at.is_none())
            .count() as i64)
    }
}
