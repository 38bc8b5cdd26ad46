//! Composite action identifier.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::marketplace::{Marketplace, ParseMarketplaceError};
use super::operation::{Operation, ParseOperationError};

/// A marketplace paired with an operation, written `<marketplace>.<operation>`
/// on the wire and in the `jobs.action_type` column (`vinted.publish`,
/// `ebay.fetch_orders`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionType {
    /// Target marketplace.
    pub marketplace: Marketplace,
    /// Command to execute there.
    pub operation: Operation,
}

impl ActionType {
    /// Pairs a marketplace with an operation.
    pub const fn new(marketplace: Marketplace, operation: Operation) -> Self {
        Self {
            marketplace,
            operation,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.marketplace.as_str(), self.operation.as_str())
    }
}

/// Error returned when parsing a malformed action type string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseActionTypeError {
    /// The string has no `.` separator.
    #[error("action type {0:?} is missing the '.' separator")]
    MissingSeparator(String),
    /// The marketplace segment is unknown.
    #[error(transparent)]
    Marketplace(#[from] ParseMarketplaceError),
    /// The operation segment is unknown.
    #[error(transparent)]
    Operation(#[from] ParseOperationError),
}

impl FromStr for ActionType {
    type Err = ParseActionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (marketplace, operation) = s
            .split_once('.')
            .ok_or_else(|| ParseActionTypeError::MissingSeparator(s.to_string()))?;
        Ok(Self {
            marketplace: marketplace.parse()?,
            operation: operation.parse()?,
        })
    }
}

impl Serialize for ActionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

impl sqlx::Type<sqlx::Postgres> for ActionType {
    fn type_info() -> <sqlx::Postgres as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &<sqlx::Postgres as sqlx::Database>::TypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ActionType {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ActionType {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let action = ActionType::new(Marketplace::Vinted, Operation::Publish);
        assert_eq!(action.to_string(), "vinted.publish");

        let action = ActionType::new(Marketplace::Ebay, Operation::SyncCatalog);
        assert_eq!(action.to_string(), "ebay.sync_catalog");
    }

    #[test]
    fn test_parse_roundtrip() {
        for marketplace in Marketplace::ALL {
            for operation in [
                Operation::Publish,
                Operation::Update,
                Operation::Delete,
                Operation::SyncCatalog,
                Operation::FetchOrders,
            ] {
                let action = ActionType::new(marketplace, operation);
                let parsed: ActionType = action.to_string().parse().unwrap();
                assert_eq!(parsed, action);
            }
        }
    }

    #[test]
    fn test_parse_missing_separator() {
        assert!(matches!(
            "vintedpublish".parse::<ActionType>(),
            Err(ParseActionTypeError::MissingSeparator(_))
        ));
    }

    #[test]
    fn test_parse_unknown_segments() {
        assert!(matches!(
            "amazon.publish".parse::<ActionType>(),
            Err(ParseActionTypeError::Marketplace(_))
        ));
        assert!(matches!(
            "vinted.reprice".parse::<ActionType>(),
            Err(ParseActionTypeError::Operation(_))
        ));
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let action = ActionType::new(Marketplace::Depop, Operation::FetchOrders);
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, "\"depop.fetch_orders\"");
        let back: ActionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
