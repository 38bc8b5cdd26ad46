//! Background job domain entities.

pub mod model;
pub mod status;

pub use model::{suggested_idempotency_key, Job, SubmitJob};
pub use status::JobStatus;
