//! Order table row and upsert payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sellsync_core::types::{OrderId, UserId};

use crate::action::Marketplace;

/// A row of the `marketplace_orders` table.
///
/// Orders are keyed by the natural key `(user_id, marketplace, external_id)`
/// rather than the surrogate `id`; repeated imports of the same order update
/// the existing row in place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MarketplaceOrder {
    /// Surrogate primary key.
    pub id: OrderId,
    /// Account the order belongs to.
    pub user_id: UserId,
    /// Marketplace the order came from.
    pub marketplace: Marketplace,
    /// The marketplace's own order identifier.
    pub external_id: String,
    /// Marketplace-reported order status, stored verbatim.
    pub status: String,
    /// Buyer handle, when the marketplace exposes one.
    pub buyer_username: Option<String>,
    /// Order total in minor currency units.
    pub total_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Full order payload as the agent reported it.
    pub raw_data: serde_json::Value,
    /// When the buyer placed the order, if reported.
    pub placed_at: Option<DateTime<Utc>>,
    /// When an agent last reported this order.
    pub fetched_at: DateTime<Utc>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting or refreshing one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOrder {
    /// Account the order belongs to.
    pub user_id: UserId,
    /// Marketplace the order came from.
    pub marketplace: Marketplace,
    /// The marketplace's own order identifier.
    pub external_id: String,
    /// Marketplace-reported order status.
    pub status: String,
    /// Buyer handle, when available.
    pub buyer_username: Option<String>,
    /// Order total in minor currency units.
    pub total_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Full order payload as reported.
    pub raw_data: serde_json::Value,
    /// When the buyer placed the order, if reported.
    pub placed_at: Option<DateTime<Utc>>,
}
