//! # sellsync-worker
//!
//! Background job execution: the action handler registry, the job queue
//! facade, the processor loop that claims and runs jobs, batch outcome
//! aggregation, and the cron-driven maintenance tasks.

pub mod actions;
pub mod batch;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod scheduler;

pub use batch::BatchAggregator;
pub use processor::JobProcessor;
pub use queue::{JobQueue, QueueStats};
pub use registry::{ActionError, ActionHandler, ActionRegistry};
pub use scheduler::CronScheduler;
