//! Action handlers for remote marketplace commands.
//!
//! Every handler follows the same shape: build the command payload from
//! the job's input, send it over the bridge with the operation's deadline,
//! and classify failures for the retry machinery. Transport failures are
//! always retryable; failures the agent itself reports are fatal unless
//! their code names a passing condition.

pub mod listing;
pub mod orders;
pub mod sync;

pub use listing::{DeleteListingHandler, PublishListingHandler, UpdateListingHandler};
pub use orders::FetchOrdersHandler;
pub use sync::CatalogSyncHandler;

use sellsync_bridge::BridgeError;

use crate::registry::ActionError;

/// Agent error codes that describe a passing condition worth retrying.
const RETRYABLE_AGENT_CODES: [&str; 4] =
    ["rate_limited", "captcha", "session_expired", "agent_busy"];

/// Maps a bridge failure onto the retry classification handlers share.
pub(crate) fn classify_bridge_error(err: BridgeError) -> ActionError {
    match &err {
        BridgeError::NotConnected(_) | BridgeError::Timeout { .. } | BridgeError::ChannelClosed => {
            ActionError::Retryable(err.to_string())
        }
        BridgeError::Remote { source, .. } => {
            if RETRYABLE_AGENT_CODES.contains(&source.code.as_str()) {
                ActionError::Retryable(err.to_string())
            } else {
                ActionError::Fatal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellsync_bridge::RemoteError;
    use sellsync_core::types::UserId;
    use sellsync_entity::action::{ActionType, Marketplace, Operation};

    fn remote(code: &str) -> BridgeError {
        BridgeError::Remote {
            action: ActionType::new(Marketplace::Ebay, Operation::Publish),
            source: RemoteError {
                code: code.to_string(),
                message: "from agent".to_string(),
            },
        }
    }

    #[test]
    fn test_transport_failures_are_retryable() {
        for err in [
            BridgeError::NotConnected(UserId::new()),
            BridgeError::Timeout {
                action: ActionType::new(Marketplace::Ebay, Operation::Publish),
                timeout_secs: 60,
            },
            BridgeError::ChannelClosed,
        ] {
            assert!(matches!(
                classify_bridge_error(err),
                ActionError::Retryable(_)
            ));
        }
    }

    #[test]
    fn test_passing_agent_conditions_are_retryable() {
        for code in ["rate_limited", "captcha", "session_expired", "agent_busy"] {
            assert!(matches!(
                classify_bridge_error(remote(code)),
                ActionError::Retryable(_)
            ));
        }
    }

    #[test]
    fn test_other_agent_errors_are_fatal() {
        for code in ["validation_failed", "listing_not_found", "unknown"] {
            assert!(matches!(
                classify_bridge_error(remote(code)),
                ActionError::Fatal(_)
            ));
        }
    }
}
