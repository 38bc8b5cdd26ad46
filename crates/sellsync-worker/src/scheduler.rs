//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use sellsync_bridge::RpcBridge;
use sellsync_core::config::WorkerConfig;
use sellsync_core::{AppError, AppResult};
use sellsync_entity::action::{ActionType, Marketplace, Operation};
use sellsync_entity::job::SubmitJob;

use crate::batch::BatchAggregator;
use crate::queue::JobQueue;

/// Cron-based scheduler for the periodic maintenance tasks: expiring
/// overdue jobs, archiving old ones, and polling orders for connected
/// users.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Job queue the tasks submit into and sweep
    queue: Arc<JobQueue>,
    /// Batch accounting for jobs the expiry sweep settles
    batches: Arc<BatchAggregator>,
    /// Bridge, for the set of currently connected users
    bridge: Arc<RpcBridge>,
    /// Worker settings: retention window and order poll cadence
    config: WorkerConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(
        queue: Arc<JobQueue>,
        batches: Arc<BatchAggregator>,
        bridge: Arc<RpcBridge>,
        config: WorkerConfig,
    ) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            queue,
            batches,
            bridge,
            config,
        })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self) -> AppResult<()> {
        self.register_expiry_sweep().await?;
        self.register_archival_sweep().await?;
        self.register_order_poll().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler. Task invocations already running finish on
    /// their own.
    pub async fn shutdown(&self) -> AppResult<()> {
        // The scheduler is a shared handle; shutdown wants it mutable.
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Expiry sweep — every minute
    async fn register_expiry_sweep(&self) -> AppResult<()> {
        let queue = Arc::clone(&self.queue);
        let batches = Arc::clone(&self.batches);
        let job = CronJob::new_async("0 * * * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let batches = Arc::clone(&batches);
            Box::pin(async move {
                tracing::trace!("Running expiry sweep");
                match queue.expire_due().await {
                    Ok(expired) => {
                        for job in &expired {
                            if let Err(e) = batches.note_terminal(job).await {
                                tracing::error!(
                                    "Failed to count expired job {} against its batch: {}",
                                    job.id,
                                    e
                                );
                            }
                        }
                    }
                    Err(e) => tracing::error!("Expiry sweep failed: {}", e),
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create expiry_sweep schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add expiry_sweep schedule: {}", e)))?;

        tracing::info!("Registered: expiry_sweep (every 1min)");
        Ok(())
    }

    /// Archival sweep — every day at 4 AM
    async fn register_archival_sweep(&self) -> AppResult<()> {
        let queue = Arc::clone(&self.queue);
        let retention_days = self.config.job_retention_days;
        let job = CronJob::new_async("0 0 4 * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Running archival sweep");
                if let Err(e) = queue.archive_older_than(retention_days).await {
                    tracing::error!("Archival sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create archival_sweep schedule: {}", e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add archival_sweep schedule: {}", e))
        })?;

        tracing::info!("Registered: archival_sweep (daily at 4AM)");
        Ok(())
    }

    /// Order poll — every N minutes, from config
    async fn register_order_poll(&self) -> AppResult<()> {
        let interval_minutes = self.config.order_poll_interval_minutes.clamp(1, 59);
        let schedule = format!("0 */{} * * * *", interval_minutes);

        let queue = Arc::clone(&self.queue);
        let bridge = Arc::clone(&self.bridge);
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            let bridge = Arc::clone(&bridge);
            Box::pin(async move {
                tracing::debug!("Running order poll");
                poll_orders(&queue, &bridge, interval_minutes).await;
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create order_poll schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add order_poll schedule: {}", e)))?;

        tracing::info!("Registered: order_poll (every {}min)", interval_minutes);
        Ok(())
    }
}

/// Submits one `fetch_orders` job per connected user and marketplace.
///
/// The idempotency key pins each submission to the current polling window,
/// so an overlapping sweep or a still-running fetch coalesces instead of
/// piling up. Each job expires one interval after submission; a stale poll
/// nobody claimed is worthless once the next one exists.
async fn poll_orders(queue: &JobQueue, bridge: &RpcBridge, interval_minutes: u32) {
    let window_secs = i64::from(interval_minutes) * 60;
    let window = Utc::now().timestamp() / window_secs;

    for user_id in bridge.connected_user_ids() {
        for marketplace in Marketplace::ALL {
            let mut submit = SubmitJob::new(
                user_id,
                ActionType::new(marketplace, Operation::FetchOrders),
                serde_json::json!({ "since": null }),
            );
            submit.priority = 200;
            submit.max_retries = 1;
            submit.idempotency_key =
                Some(format!("fetch_orders_{}_{}_{}", marketplace, user_id, window));
            submit.expires_at = Some(Utc::now() + chrono::Duration::seconds(window_secs));

            if let Err(e) = queue.submit(submit).await {
                tracing::error!(
                    "Failed to submit order poll for user {} on {}: {}",
                    user_id,
                    marketplace,
                    e
                );
            }
        }
    }
}
