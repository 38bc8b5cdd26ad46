//! # sellsync-bridge
//!
//! Remote-execution bridge between the server and per-user browser agents.
//! Marketplace calls never run on the server; jobs are dispatched as
//! commands over the user's WebSocket connections and executed by the agent
//! inside the user's own browser session. This crate owns the connection
//! registry, the in-flight request table, and the request/response pairing.

pub mod connection;
pub mod message;
pub mod pending;
pub mod rpc;
pub mod ws;

pub use connection::{ConnectionHandle, ConnectionId, ConnectionPool};
pub use message::{InboundMessage, OutboundMessage, RemoteError};
pub use rpc::{BridgeError, RpcBridge};
