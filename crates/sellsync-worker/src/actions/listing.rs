//! Listing lifecycle handlers: publish, update, delete.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use sellsync_bridge::RpcBridge;
use sellsync_entity::action::{ActionType, Marketplace, Operation};
use sellsync_entity::job::Job;

use crate::actions::classify_bridge_error;
use crate::registry::{ActionError, ActionHandler};

/// Publishes a new listing on one marketplace.
///
/// The job's whole `input_data` is the listing draft; the agent owns the
/// mapping onto marketplace-specific fields.
#[derive(Debug)]
pub struct PublishListingHandler {
    marketplace: Marketplace,
    bridge: Arc<RpcBridge>,
}

impl PublishListingHandler {
    pub fn new(marketplace: Marketplace, bridge: Arc<RpcBridge>) -> Self {
        Self {
            marketplace,
            bridge,
        }
    }
}

#[async_trait]
impl ActionHandler for PublishListingHandler {
    fn action_type(&self) -> ActionType {
        ActionType::new(self.marketplace, Operation::Publish)
    }

    fn timeout(&self) -> Duration {
        self.bridge.timeout_for(Operation::Publish)
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let payload = json!({ "listing": job.input_data });
        let data = self
            .bridge
            .call(job.user_id, self.action_type(), payload, self.timeout())
            .await
            .map_err(classify_bridge_error)?;
        Ok(Some(data))
    }
}

/// Edits an existing listing identified by its marketplace id.
#[derive(Debug)]
pub struct UpdateListingHandler {
    marketplace: Marketplace,
    bridge: Arc<RpcBridge>,
}

impl UpdateListingHandler {
    pub fn new(marketplace: Marketplace, bridge: Arc<RpcBridge>) -> Self {
        Self {
            marketplace,
            bridge,
        }
    }
}

#[async_trait]
impl ActionHandler for UpdateListingHandler {
    fn action_type(&self) -> ActionType {
        ActionType::new(self.marketplace, Operation::Update)
    }

    fn timeout(&self) -> Duration {
        self.bridge.timeout_for(Operation::Update)
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let external_id = require_external_id(job)?;
        let changes = job.input_data.get("changes").cloned().ok_or_else(|| {
            ActionError::Fatal("input_data.changes is required for an update".to_string())
        })?;

        let payload = json!({ "external_id": external_id, "changes": changes });
        let data = self
            .bridge
            .call(job.user_id, self.action_type(), payload, self.timeout())
            .await
            .map_err(classify_bridge_error)?;
        Ok(Some(data))
    }
}

/// Removes a listing from one marketplace.
#[derive(Debug)]
pub struct DeleteListingHandler {
    marketplace: Marketplace,
    bridge: Arc<RpcBridge>,
}

impl DeleteListingHandler {
    pub fn new(marketplace: Marketplace, bridge: Arc<RpcBridge>) -> Self {
        Self {
            marketplace,
            bridge,
        }
    }
}

#[async_trait]
impl ActionHandler for DeleteListingHandler {
    fn action_type(&self) -> ActionType {
        ActionType::new(self.marketplace, Operation::Delete)
    }

    fn timeout(&self) -> Duration {
        self.bridge.timeout_for(Operation::Delete)
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let external_id = require_external_id(job)?;
        let payload = json!({ "external_id": external_id });
        let data = self
            .bridge
            .call(job.user_id, self.action_type(), payload, self.timeout())
            .await
            .map_err(classify_bridge_error)?;
        Ok(Some(data))
    }
}

/// A command addressing an existing listing is unusable without its id, so
/// the job fails before anything goes over the wire.
fn require_external_id(job: &Job) -> Result<&str, ActionError> {
    job.input_data
        .get("external_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::Fatal("input_data.external_id is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellsync_bridge::OutboundMessage;
    use sellsync_core::config::BridgeConfig;
    use sellsync_core::types::UserId;
    use sellsync_entity::job::{JobStatus, SubmitJob};

    fn make_bridge() -> Arc<RpcBridge> {
        Arc::new(RpcBridge::new(BridgeConfig::default()))
    }

    fn make_job(user_id: UserId, action: ActionType, input: Value) -> Job {
        let submit = SubmitJob::new(user_id, action, input);
        Job {
            id: sellsync_core::types::JobId::new(),
            user_id: submit.user_id,
            batch_id: None,
            action_type: submit.action_type,
            status: JobStatus::Running,
            priority: submit.priority,
            retry_count: 0,
            max_retries: submit.max_retries,
            idempotency_key: None,
            input_data: submit.input_data,
            result_data: None,
            error_message: None,
            scheduled_at: None,
            started_at: Some(chrono::Utc::now()),
            completed_at: None,
            expires_at: None,
            archived_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    /// Answers the next command on `rx` with a successful response,
    /// returning the action and payload the agent saw.
    async fn respond_ok(
        bridge: Arc<RpcBridge>,
        mut rx: tokio::sync::mpsc::Receiver<OutboundMessage>,
        data: Value,
    ) -> (ActionType, Value) {
        loop {
            match rx.recv().await.unwrap() {
                OutboundMessage::Command {
                    request_id,
                    action,
                    payload,
                } => {
                    bridge.handle_response(&request_id, true, Some(data), None);
                    return (action, payload);
                }
                OutboundMessage::Ping { .. } => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_update_without_external_id_fails_before_sending() {
        let bridge = make_bridge();
        let handler = UpdateListingHandler::new(Marketplace::Vinted, Arc::clone(&bridge));
        let job = make_job(
            UserId::new(),
            handler.action_type(),
            json!({"changes": {"price_cents": 1200}}),
        );

        let err = handler.execute(&job).await.unwrap_err();
        match err {
            ActionError::Fatal(message) => assert!(message.contains("external_id")),
            other => panic!("expected fatal, got {other:?}"),
        }
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_without_agent_is_retryable() {
        let bridge = make_bridge();
        let handler = PublishListingHandler::new(Marketplace::Depop, bridge);
        let job = make_job(UserId::new(), handler.action_type(), json!({"title": "Hat"}));

        let err = handler.execute(&job).await.unwrap_err();
        assert!(matches!(err, ActionError::Retryable(_)));
    }

    #[tokio::test]
    async fn test_update_sends_external_id_and_changes() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, rx) = bridge.register_agent(user_id);

        let responder = tokio::spawn(respond_ok(
            Arc::clone(&bridge),
            rx,
            json!({"updated": true}),
        ));

        let handler = UpdateListingHandler::new(Marketplace::Vinted, Arc::clone(&bridge));
        let job = make_job(
            user_id,
            handler.action_type(),
            json!({"external_id": "V-9", "changes": {"price_cents": 1500}}),
        );

        let result = handler.execute(&job).await.unwrap();
        assert_eq!(result, Some(json!({"updated": true})));

        let (action, payload) = responder.await.unwrap();
        assert_eq!(action, ActionType::new(Marketplace::Vinted, Operation::Update));
        assert_eq!(payload["external_id"], "V-9");
        assert_eq!(payload["changes"]["price_cents"], 1500);
    }

    #[tokio::test]
    async fn test_publish_wraps_input_as_listing() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, rx) = bridge.register_agent(user_id);

        let responder = tokio::spawn(respond_ok(
            Arc::clone(&bridge),
            rx,
            json!({"external_id": "D-77"}),
        ));

        let handler = PublishListingHandler::new(Marketplace::Depop, Arc::clone(&bridge));
        let job = make_job(
            user_id,
            handler.action_type(),
            json!({"title": "Hat", "price_cents": 900}),
        );

        let result = handler.execute(&job).await.unwrap();
        assert_eq!(result, Some(json!({"external_id": "D-77"})));

        let (_action, payload) = responder.await.unwrap();
        assert_eq!(payload["listing"]["title"], "Hat");
    }
}
