//! In-flight request table.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use sellsync_core::types::UserId;
use sellsync_entity::action::ActionType;

use crate::message::RemoteError;

/// What a pending request resolves to: the agent's payload or its error.
pub type ResponseResult = Result<Value, RemoteError>;

/// One in-flight remote call waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    /// User whose agent the command went to.
    pub user_id: UserId,
    /// Command the request carries.
    pub action: ActionType,
    /// Completion channel back to the waiting caller.
    pub tx: oneshot::Sender<ResponseResult>,
}

/// Table of in-flight requests, keyed by request id.
///
/// Owned by one bridge instance, never shared globally. An entry leaves the
/// table exactly once: through the response that resolves it, or through
/// the caller's cleanup guard after a timeout. A response that finds no
/// entry is late or duplicated and is dropped.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: DashMap<String, PendingRequest>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an in-flight request.
    pub fn insert(&self, request_id: &str, request: PendingRequest) {
        if let Some(displaced) = self.inner.insert(request_id.to_string(), request) {
            // Request ids carry a random suffix, so this points at an id
            // generation bug rather than normal traffic.
            warn!(
                request_id,
                user_id = %displaced.user_id,
                "Displaced an in-flight request with the same id"
            );
        }
    }

    /// Resolves an in-flight request with the agent's result. Returns false
    /// when no entry exists, meaning the response is late or duplicated.
    pub fn resolve(&self, request_id: &str, result: ResponseResult) -> bool {
        let Some((_, request)) = self.inner.remove(request_id) else {
            return false;
        };
        if request.tx.send(result).is_err() {
            // The caller gave up between removal and delivery.
            debug!(request_id, "Pending request resolved after its caller left");
        }
        true
    }

    /// Drops an entry if still present. Returns true when one was removed.
    pub fn remove(&self, request_id: &str) -> bool {
        self.inner.remove(request_id).is_some()
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellsync_entity::action::{Marketplace, Operation};

    fn make_request() -> (PendingRequest, oneshot::Receiver<ResponseResult>) {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            user_id: UserId::new(),
            action: ActionType::new(Marketplace::Vinted, Operation::Publish),
            tx,
        };
        (request, rx)
    }

    #[tokio::test]
    async fn test_resolve_delivers_to_caller() {
        let pending = PendingRequests::new();
        let (request, rx) = make_request();
        pending.insert("r1", request);
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve("r1", Ok(serde_json::json!({"listing_id": "V-9"}))));
        assert!(pending.is_empty());

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result["listing_id"], "V-9");
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_reports_miss() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve("ghost", Ok(Value::Null)));
    }

    #[tokio::test]
    async fn test_entry_leaves_table_exactly_once() {
        let pending = PendingRequests::new();
        let (request, _rx) = make_request();
        pending.insert("r1", request);

        assert!(pending.remove("r1"));
        assert!(!pending.remove("r1"));
        assert!(!pending.resolve("r1", Ok(Value::Null)));
    }

    #[tokio::test]
    async fn test_resolve_tolerates_departed_caller() {
        let pending = PendingRequests::new();
        let (request, rx) = make_request();
        pending.insert("r1", request);
        drop(rx);

        // The entry is still consumed even though nobody is listening.
        assert!(pending.resolve("r1", Ok(Value::Null)));
        assert!(pending.is_empty());
    }
}
