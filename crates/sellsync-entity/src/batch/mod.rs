//! Batch grouping of related jobs.

pub mod model;
pub mod status;

pub use model::{BatchJob, CreateBatch};
pub use status::{BatchOutcome, BatchStatus};
