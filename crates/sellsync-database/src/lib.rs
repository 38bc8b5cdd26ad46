//! # sellsync-database
//!
//! Storage layer for SellSync. The [`store`] module defines the storage
//! traits, [`repositories`] implements them on Postgres, and [`memory`]
//! implements them on plain hash maps for tests and embedded use.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{BatchStore, JobStore, OrderStore, SubmitOutcome, UpsertStrategy};
