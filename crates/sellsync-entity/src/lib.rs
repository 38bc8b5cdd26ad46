//! # sellsync-entity
//!
//! Domain entity models for SellSync. Every struct in this crate represents
//! a database table row or a domain value object. All entities derive
//! `Debug`, `Clone`, `Serialize`, `Deserialize`, and table rows additionally
//! derive `sqlx::FromRow`.

pub mod action;
pub mod batch;
pub mod job;
pub mod order;
