//! Marketplace action vocabulary.
//!
//! An [`ActionType`] names one remote operation against one marketplace,
//! for example `vinted.publish`. It is the dispatch key for job handlers
//! and the `action` field of every command sent to an agent.

pub mod action_type;
pub mod marketplace;
pub mod operation;

pub use action_type::{ActionType, ParseActionTypeError};
pub use marketplace::{Marketplace, ParseMarketplaceError};
pub use operation::{Operation, ParseOperationError};
