//! Imported marketplace orders.

pub mod model;

pub use model::{MarketplaceOrder, UpsertOrder};
