//! Agent WebSocket endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use sellsync_core::types::UserId;

use crate::connection::ConnectionHandle;
use crate::message::{InboundMessage, OutboundMessage};
use crate::rpc::RpcBridge;

/// Shared state for the agent endpoint.
#[derive(Clone)]
pub struct AgentWsState {
    /// The process-wide bridge.
    pub bridge: Arc<RpcBridge>,
}

/// Builds the router exposing `/ws/agent`.
pub fn agent_routes(bridge: Arc<RpcBridge>) -> Router {
    Router::new()
        .route("/ws/agent", get(agent_ws))
        .with_state(AgentWsState { bridge })
}

#[derive(Debug, Deserialize)]
struct AgentWsQuery {
    user_id: UserId,
}

/// Upgrade handler for agent connections.
///
/// Identity comes from the `user_id` query parameter; the deployment fronts
/// this endpoint with the main application's authenticating proxy.
async fn agent_ws(
    State(state): State<AgentWsState>,
    Query(query): Query<AgentWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_agent_socket(state, query.user_id, socket))
}

async fn handle_agent_socket(state: AgentWsState, user_id: UserId, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut outbound_rx) = state.bridge.register_agent(user_id);
    let conn_id = handle.id;
    info!(conn_id = %conn_id, user_id = %user_id, "Agent WebSocket established");

    // Drain the outbound queue into the socket.
    let outbound_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize outbound frame"),
            }
        }
    });

    let ping_interval = Duration::from_secs(state.bridge.config().ping_interval_seconds);
    let max_silence =
        ping_interval + Duration::from_secs(state.bridge.config().ping_timeout_seconds);
    let mut ping = tokio::time::interval(ping_interval);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if handle.is_stale(max_silence) {
                    warn!(conn_id = %conn_id, user_id = %user_id, "Agent stopped answering pings, closing");
                    break;
                }
                handle.send(OutboundMessage::Ping {
                    timestamp: Utc::now().timestamp_millis(),
                });
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_frame(&state, &handle, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    outbound_task.abort();
    state.bridge.unregister_agent(&conn_id);
    info!(conn_id = %conn_id, user_id = %user_id, "Agent WebSocket closed");
}

fn handle_frame(state: &AgentWsState, handle: &ConnectionHandle, text: &str) {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(InboundMessage::Response {
            request_id,
            success,
            data,
            error,
        }) => {
            state
                .bridge
                .handle_response(&request_id, success, data, error);
        }
        Ok(InboundMessage::Pong { .. }) => handle.record_pong(),
        Err(e) => {
            debug!(conn_id = %handle.id, error = %e, "Ignoring unparseable agent frame");
        }
    }
}
