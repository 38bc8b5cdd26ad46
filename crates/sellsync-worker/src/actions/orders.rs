//! Order import handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::warn;

use sellsync_bridge::RpcBridge;
use sellsync_core::types::UserId;
use sellsync_database::store::{OrderStore, UpsertStrategy};
use sellsync_entity::action::{ActionType, Marketplace, Operation};
use sellsync_entity::job::Job;
use sellsync_entity::order::UpsertOrder;

use crate::actions::classify_bridge_error;
use crate::registry::{ActionError, ActionHandler};

/// Fetches recent orders from one marketplace and upserts them locally.
///
/// The agent reports whatever the marketplace currently shows, so a fetch
/// naturally overlaps the previous one; the natural-key upsert keeps one
/// row per order either way.
#[derive(Debug)]
pub struct FetchOrdersHandler {
    marketplace: Marketplace,
    bridge: Arc<RpcBridge>,
    orders: Arc<dyn OrderStore>,
    strategy: UpsertStrategy,
}

impl FetchOrdersHandler {
    pub fn new(
        marketplace: Marketplace,
        bridge: Arc<RpcBridge>,
        orders: Arc<dyn OrderStore>,
        strategy: UpsertStrategy,
    ) -> Self {
        Self {
            marketplace,
            bridge,
            orders,
            strategy,
        }
    }
}

#[async_trait]
impl ActionHandler for FetchOrdersHandler {
    fn action_type(&self) -> ActionType {
        ActionType::new(self.marketplace, Operation::FetchOrders)
    }

    fn timeout(&self) -> Duration {
        self.bridge.timeout_for(Operation::FetchOrders)
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, ActionError> {
        let since = job.input_data.get("since").cloned().unwrap_or(Value::Null);
        let payload = json!({ "since": since });
        let data = self
            .bridge
            .call(job.user_id, self.action_type(), payload, self.timeout())
            .await
            .map_err(classify_bridge_error)?;

        let Some(entries) = data.get("orders").and_then(Value::as_array) else {
            return Err(ActionError::Fatal(
                "agent response is missing the orders array".to_string(),
            ));
        };

        let mut upserted = 0usize;
        let mut skipped = 0usize;
        for entry in entries {
            let Some(order) = parse_order(job.user_id, self.marketplace, entry) else {
                warn!(
                    job_id = %job.id,
                    marketplace = %self.marketplace,
                    "Skipping order entry without an external id"
                );
                skipped += 1;
                continue;
            };
            self.orders.upsert(&order, self.strategy).await?;
            upserted += 1;
        }

        Ok(Some(json!({
            "fetched": entries.len(),
            "upserted": upserted,
            "skipped": skipped,
        })))
    }
}

/// Builds an upsert from one agent-reported order entry. An entry without
/// an external id cannot be keyed and is unusable.
fn parse_order(user_id: UserId, marketplace: Marketplace, entry: &Value) -> Option<UpsertOrder> {
    let external_id = entry.get("external_id").and_then(Value::as_str)?;
    Some(UpsertOrder {
        user_id,
        marketplace,
        external_id: external_id.to_string(),
        status: entry
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        buyer_username: entry
            .get("buyer")
            .and_then(Value::as_str)
            .map(str::to_string),
        total_cents: entry.get("total_cents").and_then(Value::as_i64).unwrap_or(0),
        currency: entry
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("EUR")
            .to_string(),
        raw_data: entry.clone(),
        placed_at: entry
            .get("placed_at")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<DateTime<Utc>>().ok()),
    })
}
