//! In-memory implementations of the storage traits.
//!
//! Behaviorally equivalent to the Postgres stores, minus persistence. One
//! async lock per store stands in for row locking; it serializes claims and
//! upserts the same way the database does, which also makes the two upsert
//! strategies indistinguishable here.

pub mod batch;
pub mod job;
pub mod order;

pub use batch::MemoryBatchStore;
pub use job::MemoryJobStore;
pub use order::MemoryOrderStore;
