//! # sellsync-core
//!
//! Core crate for SellSync. Contains the configuration system, the unified
//! error type, and the typed identifiers shared by every other crate in the
//! workspace. This crate depends on no other SellSync crate.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
