//! Remote operations an agent can execute.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One kind of remote command, independent of the marketplace it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Create a new listing.
    Publish,
    /// Edit an existing listing.
    Update,
    /// Remove a listing.
    Delete,
    /// Reconcile the full catalog against the marketplace.
    SyncCatalog,
    /// Import recent orders.
    FetchOrders,
}

impl Operation {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Publish => "publish",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::SyncCatalog => "sync_catalog",
            Operation::FetchOrders => "fetch_orders",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(Operation::Publish),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "sync_catalog" => Ok(Operation::SyncCatalog),
            "fetch_orders" => Ok(Operation::FetchOrders),
            other => Err(ParseOperationError(other.to_string())),
        }
    }
}
