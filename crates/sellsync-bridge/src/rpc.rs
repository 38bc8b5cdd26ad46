//! Request/response RPC over agent connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use sellsync_core::config::BridgeConfig;
use sellsync_core::types::UserId;
use sellsync_entity::action::{ActionType, Operation};

use crate::connection::{ConnectionHandle, ConnectionId, ConnectionPool};
use crate::message::{OutboundMessage, RemoteError};
use crate::pending::{PendingRequest, PendingRequests, ResponseResult};

/// Failure modes of a remote call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// The user has no live agent connection. Raised before any request
    /// state is created, so it is cheap and leaves nothing behind.
    #[error("user {0} has no live agent connection")]
    NotConnected(UserId),
    /// No agent answered within the deadline.
    #[error("{action} got no response within {timeout_secs}s")]
    Timeout {
        /// The command that timed out.
        action: ActionType,
        /// The deadline that was missed.
        timeout_secs: u64,
    },
    /// The agent executed the command and reported a failure.
    #[error("{action} rejected by agent: {source}")]
    Remote {
        /// The command that was rejected.
        action: ActionType,
        /// The agent's failure detail.
        #[source]
        source: RemoteError,
    },
    /// The response channel closed without a response.
    #[error("response channel closed before a response arrived")]
    ChannelClosed,
}

/// Dispatches commands to agents and routes their responses back.
///
/// One instance per process. The pending table lives inside the instance,
/// so two bridges never share request state.
#[derive(Debug)]
pub struct RpcBridge {
    pool: ConnectionPool,
    pending: PendingRequests,
    sequence: AtomicU64,
    config: BridgeConfig,
}

impl RpcBridge {
    /// Creates a bridge with no connections.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            pool: ConnectionPool::new(),
            pending: PendingRequests::new(),
            sequence: AtomicU64::new(0),
            config,
        }
    }

    /// Registers a new agent connection for a user. Returns the handle and
    /// the receiving end the socket task forwards to the agent.
    ///
    /// A user at their connection limit has their oldest connection evicted
    /// to make room.
    pub fn register_agent(
        &self,
        user_id: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let existing = self.pool.get_user_connections(&user_id);
        if existing.len() >= self.config.max_connections_per_user {
            if let Some(oldest) = existing.iter().min_by_key(|c| c.connected_at) {
                warn!(
                    conn_id = %oldest.id,
                    user_id = %user_id,
                    "Connection limit reached, evicting oldest connection"
                );
                oldest.mark_dead();
                self.pool.remove(&oldest.id);
            }
        }

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(user_id, tx));
        self.pool.add(Arc::clone(&handle));
        info!(conn_id = %handle.id, user_id = %user_id, "Agent connection registered");
        (handle, rx)
    }

    /// Removes a connection. Calls already broadcast to it are not
    /// recalled; they resolve through another connection or time out.
    pub fn unregister_agent(&self, id: &ConnectionId) {
        if let Some(handle) = self.pool.remove(id) {
            handle.mark_dead();
            info!(conn_id = %handle.id, user_id = %handle.user_id, "Agent connection unregistered");
        }
    }

    /// Sends a command to the user's agent and waits for the response.
    ///
    /// The command is broadcast to every live connection of the user and
    /// the first response wins. With no live connection the call fails
    /// immediately without creating request state.
    pub async fn call(
        &self,
        user_id: UserId,
        action: ActionType,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        let connections: Vec<_> = self
            .pool
            .get_user_connections(&user_id)
            .into_iter()
            .filter(|c| c.is_alive())
            .collect();
        if connections.is_empty() {
            return Err(BridgeError::NotConnected(user_id));
        }

        let request_id = self.next_request_id(user_id);
        let (tx, rx) = oneshot::channel();
        self.pending
            .insert(&request_id, PendingRequest { user_id, action, tx });
        // Removes the entry on every exit path below; a no-op when the
        // response already resolved it.
        let _cleanup = PendingCleanup {
            pending: &self.pending,
            request_id: &request_id,
        };

        let command = OutboundMessage::Command {
            request_id: request_id.clone(),
            action,
            payload,
        };
        let mut delivered = 0usize;
        for connection in &connections {
            if connection.send(command.clone()) {
                delivered += 1;
            }
        }
        if delivered == 0 {
            return Err(BridgeError::NotConnected(user_id));
        }
        debug!(
            request_id,
            user_id = %user_id,
            action = %action,
            delivered,
            "Command dispatched"
        );

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(remote))) => Err(BridgeError::Remote {
                action,
                source: remote,
            }),
            Ok(Err(_)) => Err(BridgeError::ChannelClosed),
            Err(_) => {
                debug!(request_id, user_id = %user_id, action = %action, "Remote call timed out");
                Err(BridgeError::Timeout {
                    action,
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Routes one agent response to its waiting caller. Returns false when
    /// the response matches no in-flight request (late or duplicate).
    pub fn handle_response(
        &self,
        request_id: &str,
        success: bool,
        data: Option<Value>,
        error: Option<RemoteError>,
    ) -> bool {
        let result: ResponseResult = if success {
            Ok(data.unwrap_or(Value::Null))
        } else {
            Err(error.unwrap_or_else(|| RemoteError {
                code: "unknown".to_string(),
                message: "agent reported failure without detail".to_string(),
            }))
        };

        let resolved = self.pending.resolve(request_id, result);
        if !resolved {
            debug!(request_id, "Dropping response with no pending request");
        }
        resolved
    }

    /// Configured deadline for one operation class.
    pub fn timeout_for(&self, operation: Operation) -> Duration {
        let secs = match operation {
            Operation::Publish | Operation::Update | Operation::Delete => {
                self.config.listing_timeout_seconds
            }
            Operation::FetchOrders => self.config.order_fetch_timeout_seconds,
            Operation::SyncCatalog => self.config.catalog_sync_timeout_seconds,
        };
        Duration::from_secs(secs)
    }

    /// True when the user has at least one live connection.
    pub fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.pool
            .get_user_connections(user_id)
            .iter()
            .any(|c| c.is_alive())
    }

    /// Users that currently have at least one connection.
    pub fn connected_user_ids(&self) -> Vec<UserId> {
        self.pool.connected_user_ids()
    }

    /// Total number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Number of users with at least one connection.
    pub fn user_count(&self) -> usize {
        self.pool.user_count()
    }

    /// Number of requests currently in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn next_request_id(&self, user_id: UserId) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{user_id}-{seq}-{:08x}", rand::random::<u32>())
    }
}

struct PendingCleanup<'a> {
    pending: &'a PendingRequests,
    request_id: &'a str,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellsync_entity::action::Marketplace;

    fn make_bridge() -> Arc<RpcBridge> {
        Arc::new(RpcBridge::new(BridgeConfig::default()))
    }

    fn publish_action() -> ActionType {
        ActionType::new(Marketplace::Vinted, Operation::Publish)
    }

    /// Pulls the next command frame off a connection's outbound queue.
    async fn next_command(rx: &mut mpsc::Receiver<OutboundMessage>) -> (String, Value) {
        loop {
            match rx.recv().await.expect("connection queue closed") {
                OutboundMessage::Command {
                    request_id,
                    payload,
                    ..
                } => return (request_id, payload),
                OutboundMessage::Ping { .. } => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_call_without_connection_fails_fast() {
        let bridge = make_bridge();
        let result = bridge
            .call(
                UserId::new(),
                publish_action(),
                serde_json::json!({}),
                Duration::from_secs(60),
            )
            .await;

        assert!(matches!(result, Err(BridgeError::NotConnected(_))));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_fails_fast_when_only_connection_is_gone() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, rx) = bridge.register_agent(user_id);
        drop(rx);

        let result = bridge
            .call(
                user_id,
                publish_action(),
                serde_json::json!({}),
                Duration::from_secs(60),
            )
            .await;

        assert!(matches!(result, Err(BridgeError::NotConnected(_))));
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_resolves_with_agent_response() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, mut rx) = bridge.register_agent(user_id);

        let responder = Arc::clone(&bridge);
        let agent = tokio::spawn(async move {
            let (request_id, payload) = next_command(&mut rx).await;
            assert_eq!(payload["listing"]["title"], "wool coat");
            responder.handle_response(
                &request_id,
                true,
                Some(serde_json::json!({"listing_id": "V-9"})),
                None,
            );
        });

        let data = bridge
            .call(
                user_id,
                publish_action(),
                serde_json::json!({"listing": {"title": "wool coat"}}),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(data["listing_id"], "V-9");
        assert_eq!(bridge.pending_count(), 0);
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_surfaces_remote_failure() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, mut rx) = bridge.register_agent(user_id);

        let responder = Arc::clone(&bridge);
        let agent = tokio::spawn(async move {
            let (request_id, _) = next_command(&mut rx).await;
            responder.handle_response(
                &request_id,
                false,
                None,
                Some(RemoteError {
                    code: "validation".to_string(),
                    message: "title too long".to_string(),
                }),
            );
        });

        let result = bridge
            .call(
                user_id,
                publish_action(),
                serde_json::json!({}),
                Duration::from_secs(5),
            )
            .await;

        match result {
            Err(BridgeError::Remote { source, .. }) => assert_eq!(source.code, "validation"),
            other => panic!("expected remote error, got {other:?}"),
        }
        assert_eq!(bridge.pending_count(), 0);
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_cleans_pending_and_late_response_is_dropped() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_handle, mut rx) = bridge.register_agent(user_id);

        let result = bridge
            .call(
                user_id,
                publish_action(),
                serde_json::json!({}),
                Duration::from_millis(50),
            )
            .await;

        assert!(matches!(result, Err(BridgeError::Timeout { .. })));
        assert_eq!(bridge.pending_count(), 0);

        // The command reached the agent; its answer now has nowhere to go.
        let (request_id, _) = next_command(&mut rx).await;
        assert!(!bridge.handle_response(&request_id, true, Some(Value::Null), None));
    }

    #[tokio::test]
    async fn test_first_response_wins_and_duplicate_is_dropped() {
        let bridge = make_bridge();
        let user_id = UserId::new();
        let (_first, mut rx_first) = bridge.register_agent(user_id);
        let (_second, mut rx_second) = bridge.register_agent(user_id);

        let caller = Arc::clone(&bridge);
        let call = tokio::spawn(async move {
            caller
                .call(
                    user_id,
                    publish_action(),
                    serde_json::json!({}),
                    Duration::from_secs(5),
                )
                .await
        });

        // Both connections of the room received the same command.
        let (id_first, _) = next_command(&mut rx_first).await;
        let (id_second, _) = next_command(&mut rx_second).await;
        assert_eq!(id_first, id_second);

        assert!(bridge.handle_response(
            &id_first,
            true,
            Some(serde_json::json!({"from": "first"})),
            None
        ));
        assert!(!bridge.handle_response(
            &id_second,
            true,
            Some(serde_json::json!({"from": "second"})),
            None
        ));

        let data = call.await.unwrap().unwrap();
        assert_eq!(data["from"], "first");
        assert_eq!(bridge.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_calls_are_isolated_per_user() {
        let bridge = make_bridge();
        let alice = UserId::new();
        let bob = UserId::new();
        let (_alice_conn, mut alice_rx) = bridge.register_agent(alice);
        let (_bob_conn, mut bob_rx) = bridge.register_agent(bob);

        let caller = Arc::clone(&bridge);
        let call = tokio::spawn(async move {
            caller
                .call(
                    alice,
                    publish_action(),
                    serde_json::json!({}),
                    Duration::from_secs(5),
                )
                .await
        });

        let (request_id, _) = next_command(&mut alice_rx).await;
        bridge.handle_response(&request_id, true, Some(Value::Null), None);
        call.await.unwrap().unwrap();

        // Bob's agent never saw the command.
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_limit_evicts_oldest() {
        let config = BridgeConfig {
            max_connections_per_user: 2,
            ..BridgeConfig::default()
        };
        let bridge = RpcBridge::new(config);
        let user_id = UserId::new();

        let (first, _rx1) = bridge.register_agent(user_id);
        let (_second, _rx2) = bridge.register_agent(user_id);
        let (_third, _rx3) = bridge.register_agent(user_id);

        assert_eq!(bridge.connection_count(), 2);
        assert!(!first.is_alive());
    }

    #[tokio::test]
    async fn test_timeout_for_matches_operation_class() {
        let bridge = make_bridge();
        assert_eq!(
            bridge.timeout_for(Operation::Publish),
            Duration::from_secs(60)
        );
        assert_eq!(
            bridge.timeout_for(Operation::Update),
            Duration::from_secs(60)
        );
        assert_eq!(
            bridge.timeout_for(Operation::Delete),
            Duration::from_secs(60)
        );
        assert_eq!(
            bridge.timeout_for(Operation::FetchOrders),
            Duration::from_secs(180)
        );
        assert_eq!(
            bridge.timeout_for(Operation::SyncCatalog),
            Duration::from_secs(300)
        );
    }
}
