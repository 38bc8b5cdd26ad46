//! Catalog reconciliation handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use sellsync_bridge::RpcBridge;
use sellsync_entity::action::{ActionType, Marketplace, Operation};
use sellsync_entity::job::Job;

use crate::actions::classify_bridge_error;
use crate::registry::{ActionError, ActionHandler};

/// Reconciles the user's catalog against one marketplace.
///
/// The agent walks the remote inventory itself and reports a summary; the
/// job's `input_data` passes through as sync options.
#[derive(Debug)]
pub struct CatalogSyncHandler {
    marketplace: Marketplace,
    bridge: Arc<RpcBridge>,
}

impl CatalogSyncHandler {
    pub fn new(marketplace: Marketplace, bridge: Arc<RpcBridge>) -> Self {
        Self {
            marketplace,
            bridge,
        }
    }
}

#[async_trait]
impl ActionHandler for CatalogSyncHandler {
    fn action_type(&self) -> ActionType {
        ActionType::new(self.marketplace, Operation::SyncCatalog)
    }

    fn timeout(&self) -> Duration {
        self.bridge.timeout_for(Operation::SyncCatalog)
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let payload = json!({ "options": job.input_data });
        let data = self
            .bridge
            .call(job.user_id, self.action_type(), payload, self.timeout())
            .await
            .map_err(classify_bridge_error)?;
        Ok(Some(data))
    }
}
