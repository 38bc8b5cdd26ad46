//! Wire frames exchanged with agents.
//!
//! Frames are JSON text messages tagged with a `type` field. A command
//! carries `{request_id, action, payload}`; the matching response carries
//! `{request_id, success, data | error}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sellsync_entity::action::ActionType;

/// Frames the server sends to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A remote command to execute.
    Command {
        /// Correlates the eventual response back to the waiting caller.
        request_id: String,
        /// What to do, e.g. `vinted.publish`.
        action: ActionType,
        /// Handler-built input for the command.
        payload: Value,
    },
    /// Liveness probe; the agent answers with a pong.
    Ping {
        /// Server clock at send time, in epoch milliseconds.
        timestamp: i64,
    },
}

/// Frames an agent sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Result of a previously received command.
    Response {
        /// Echo of the command's request id.
        request_id: String,
        /// Whether the command succeeded.
        success: bool,
        /// Result payload, present on success.
        #[serde(default)]
        data: Option<Value>,
        /// Failure detail, present on failure.
        #[serde(default)]
        error: Option<RemoteError>,
    },
    /// Answer to a server ping.
    Pong {
        /// Echo of the ping timestamp.
        timestamp: i64,
    },
}

/// Failure reported by an agent for one command.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Stable machine-readable code, e.g. `validation` or `rate_limited`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}
