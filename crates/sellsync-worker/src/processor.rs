//! Worker loop claiming and executing jobs.
//!
//! One processor per instance. A semaphore caps in-flight executions; the
//! loop polls the queue on a fixed cadence, spawns one task per claimed
//! job, and on shutdown stops claiming and waits for the in-flight tasks
//! to drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use sellsync_core::config::WorkerConfig;
use sellsync_entity::job::Job;

use crate::batch::BatchAggregator;
use crate::queue::JobQueue;
use crate::registry::{ActionError, ActionRegistry};

/// Claims due jobs and drives them through their handlers.
#[derive(Debug)]
pub struct JobProcessor {
    queue: Arc<JobQueue>,
    registry: Arc<ActionRegistry>,
    batches: Arc<BatchAggregator>,
    config: WorkerConfig,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<ActionRegistry>,
        batches: Arc<BatchAggregator>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            batches,
            config,
        }
    }

    /// Runs until `shutdown` flips to true, then drains in-flight jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.config.concurrency,
            poll_interval_seconds = self.config.poll_interval_seconds,
            "Job processor started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {
                    self.spawn_due_jobs(&semaphore).await;
                }
            }
        }

        info!("Job processor draining");
        let all_permits = self.config.concurrency as u32;
        let drain = Duration::from_secs(self.config.drain_timeout_seconds);
        match tokio::time::timeout(drain, semaphore.acquire_many(all_permits)).await {
            Ok(_) => info!("Job processor drained"),
            Err(_) => warn!(
                drain_timeout_seconds = self.config.drain_timeout_seconds,
                "Drain timed out with jobs still in flight"
            ),
        }
    }

    /// Claims jobs until the queue is empty or every execution slot is
    /// busy, spawning one task per claim.
    async fn spawn_due_jobs(&self, semaphore: &Arc<Semaphore>) {
        loop {
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                return;
            };

            let job = match self.queue.claim().await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    error!(error = %e, "Failed to claim a job");
                    return;
                }
            };

            let queue = Arc::clone(&self.queue);
            let registry = Arc::clone(&self.registry);
            let batches = Arc::clone(&self.batches);
            tokio::spawn(async move {
                let _permit = permit;
                execute_job(&queue, &registry, &batches, job).await;
            });
        }
    }
}

/// Executes one claimed job and records its outcome.
async fn execute_job(
    queue: &JobQueue,
    registry: &ActionRegistry,
    batches: &BatchAggregator,
    job: Job,
) {
    debug!(
        job_id = %job.id,
        action = %job.action_type,
        attempt = job.retry_count + 1,
        "Executing job"
    );

    let store_result = match registry.execute(&job).await {
        Ok(result) => queue.complete(job.id, result.as_ref()).await,
        Err(ActionError::Retryable(message)) => {
            warn!(job_id = %job.id, error = %message, "Job execution failed, may retry");
            queue.fail_retryable(&job, &message).await
        }
        Err(ActionError::Fatal(message)) => {
            warn!(job_id = %job.id, error = %message, "Job execution failed fatally");
            queue.fail_fatal(job.id, &message).await
        }
        Err(ActionError::Internal(err)) => {
            error!(job_id = %job.id, error = %err, "Job execution hit an internal error");
            queue.fail_fatal(job.id, &err.to_string()).await
        }
    };

    let updated = match store_result {
        Ok(updated) => updated,
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to record job outcome");
            return;
        }
    };

    match updated {
        Some(job) if job.is_terminal() => {
            info!(job_id = %job.id, status = %job.status, "Job settled");
            if let Err(e) = batches.note_terminal(&job).await {
                error!(job_id = %job.id, error = %e, "Failed to count job against its batch");
            }
        }
        Some(job) => {
            debug!(
                job_id = %job.id,
                retry_count = job.retry_count,
                scheduled_at = ?job.scheduled_at,
                "Job requeued for retry"
            );
        }
        None => {
            // The job left `running` underneath us, most likely a concurrent
            // cancellation. Whoever moved it owns the batch accounting.
            debug!(job_id = %job.id, "Job no longer running, outcome dropped");
        }
    }
}
