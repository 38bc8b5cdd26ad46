//! Agent bridge configuration.

use serde::{Deserialize, Serialize};

/// Settings for agent WebSocket connections and remote-call deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum simultaneous agent connections per user. The oldest
    /// connection is evicted when the limit is reached.
    #[serde(default = "default_max_connections_per_user")]
    pub max_connections_per_user: usize,
    /// Outbound message buffer size per connection.
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
    /// Seconds between server-initiated pings.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Seconds past the ping interval before a silent agent is dropped.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Deadline in seconds for publish, update, and delete commands.
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_seconds: u64,
    /// Deadline in seconds for order fetch commands.
    #[serde(default = "default_order_fetch_timeout")]
    pub order_fetch_timeout_seconds: u64,
    /// Deadline in seconds for full catalog synchronization commands.
    #[serde(default = "default_catalog_sync_timeout")]
    pub catalog_sync_timeout_seconds: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_connections_per_user: default_max_connections_per_user(),
            channel_buffer_size: default_channel_buffer_size(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            listing_timeout_seconds: default_listing_timeout(),
            order_fetch_timeout_seconds: default_order_fetch_timeout(),
            catalog_sync_timeout_seconds: default_catalog_sync_timeout(),
        }
    }
}

fn default_max_connections_per_user() -> usize {
    5
}

fn default_channel_buffer_size() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_listing_timeout() -> u64 {
    60
}

fn default_order_fetch_timeout() -> u64 {
    180
}

fn default_catalog_sync_timeout() -> u64 {
    300
}
