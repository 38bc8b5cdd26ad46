//! Supported marketplaces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A marketplace a user can link through their browser agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "marketplace", rename_all = "lowercase")]
pub enum Marketplace {
    /// vinted.com second-hand fashion.
    Vinted,
    /// depop.com social selling.
    Depop,
    /// ebay.com general auctions.
    Ebay,
    /// etsy.com handmade and vintage.
    Etsy,
}

impl Marketplace {
    /// All supported marketplaces.
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Vinted,
        Marketplace::Depop,
        Marketplace::Ebay,
        Marketplace::Etsy,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Vinted => "vinted",
            Marketplace::Depop => "depop",
            Marketplace::Ebay => "ebay",
            Marketplace::Etsy => "etsy",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown marketplace name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown marketplace: {0}")]
pub struct ParseMarketplaceError(pub String);

impl FromStr for Marketplace {
    type Err = ParseMarketplaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vinted" => Ok(Marketplace::Vinted),
            "depop" => Ok(Marketplace::Depop),
            "ebay" => Ok(Marketplace::Ebay),
            "etsy" => Ok(Marketplace::Etsy),
            other => Err(ParseMarketplaceError(other.to_string())),
        }
    }
}
