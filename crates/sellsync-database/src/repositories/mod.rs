//! Postgres implementations of the storage traits.

pub mod batch;
pub mod job;
pub mod order;

pub use batch::PgBatchStore;
pub use job::PgJobStore;
pub use order::PgOrderStore;

/// True when the error is a Postgres unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
