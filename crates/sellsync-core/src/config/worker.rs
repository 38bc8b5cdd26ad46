//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Settings for the job processor and maintenance schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the embedded worker runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of jobs executing concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seconds between queue polls when the queue is empty.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Seconds to wait for running jobs to finish during shutdown.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
    /// Base delay in seconds before the first retry of a failed job.
    #[serde(default = "default_retry_backoff_base")]
    pub retry_backoff_base_seconds: u64,
    /// Upper bound in seconds for the retry delay.
    #[serde(default = "default_retry_backoff_cap")]
    pub retry_backoff_cap_seconds: u64,
    /// Days a terminal job stays queryable before the archival sweep hides it.
    #[serde(default = "default_retention_days")]
    pub job_retention_days: u32,
    /// Minutes between automatic order-poll job submissions.
    #[serde(default = "default_order_poll_interval")]
    pub order_poll_interval_minutes: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            drain_timeout_seconds: default_drain_timeout(),
            retry_backoff_base_seconds: default_retry_backoff_base(),
            retry_backoff_cap_seconds: default_retry_backoff_cap(),
            job_retention_days: default_retention_days(),
            order_poll_interval_minutes: default_order_poll_interval(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_retry_backoff_base() -> u64 {
    30
}

fn default_retry_backoff_cap() -> u64 {
    900
}

fn default_retention_days() -> u32 {
    30
}

fn default_order_poll_interval() -> u32 {
    15
}
