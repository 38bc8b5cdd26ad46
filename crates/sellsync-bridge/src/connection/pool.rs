//! Connection indexes.

use std::sync::Arc;

use dashmap::DashMap;

use sellsync_core::types::UserId;

use super::handle::{ConnectionHandle, ConnectionId};

/// All live agent connections, indexed by user and by connection id.
///
/// A user's connections form one logical room: commands for that user are
/// broadcast to every entry in their vector.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    by_user: DashMap<UserId, Vec<Arc<ConnectionHandle>>>,
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to both indexes.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_id.insert(handle.id, Arc::clone(&handle));
        self.by_user
            .entry(handle.user_id)
            .or_default()
            .push(handle);
    }

    /// Removes a connection from both indexes, returning it if present.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(id)?;
        if let Some(mut connections) = self.by_user.get_mut(&handle.user_id) {
            connections.retain(|c| c.id != *id);
            drop(connections);
            self.by_user
                .remove_if(&handle.user_id, |_, connections| connections.is_empty());
        }
        Some(handle)
    }

    /// Fetches a connection by id.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(id).map(|entry| Arc::clone(&entry))
    }

    /// Snapshot of a user's connections.
    pub fn get_user_connections(&self, user_id: &UserId) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(user_id)
            .map(|connections| connections.clone())
            .unwrap_or_default()
    }

    /// Total number of live connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of users with at least one connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Users that currently have at least one connection.
    pub fn connected_user_ids(&self) -> Vec<UserId> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }
}
