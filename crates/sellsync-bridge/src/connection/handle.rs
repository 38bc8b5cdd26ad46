//! Per-connection handle.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use uuid::Uuid;

use sellsync_core::types::UserId;

use crate::message::OutboundMessage;

/// Identifier of one WebSocket connection.
pub type ConnectionId = Uuid;

/// Server-side handle to one live agent connection.
///
/// The handle only enqueues frames; the socket task owns the sink and
/// drains the queue.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Connection identifier.
    pub id: ConnectionId,
    /// The user whose agent is on the other end.
    pub user_id: UserId,
    /// When the connection was registered.
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundMessage>,
    alive: AtomicBool,
    last_pong_ms: AtomicI64,
}

impl ConnectionHandle {
    /// Creates a handle around the outbound queue of a fresh connection.
    pub fn new(user_id: UserId, sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            connected_at: now,
            sender,
            alive: AtomicBool::new(true),
            last_pong_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Enqueues a frame for the agent. Returns false when the frame could
    /// not be enqueued; a closed queue also marks the connection dead.
    pub fn send(&self, message: OutboundMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    "Connection send buffer full, dropping frame"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Whether the connection still accepts frames.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Marks the connection unusable. One-way; a dead handle stays dead.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    /// Records that the agent answered a ping.
    pub fn record_pong(&self) {
        self.last_pong_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// True when the agent has been silent longer than `max_silence`.
    pub fn is_stale(&self, max_silence: Duration) -> bool {
        let silent_ms = Utc::now().timestamp_millis() - self.last_pong_ms.load(Ordering::Relaxed);
        silent_ms > max_silence.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_handle(buffer: usize) -> (ConnectionHandle, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (ConnectionHandle::new(UserId::new(), tx), rx)
    }

    #[tokio::test]
    async fn test_send_enqueues_frame() {
        let (handle, mut rx) = make_handle(4);
        assert!(handle.send(OutboundMessage::Ping { timestamp: 1 }));
        assert!(matches!(
            rx.recv().await,
            Some(OutboundMessage::Ping { timestamp: 1 })
        ));
    }

    #[tokio::test]
    async fn test_full_buffer_drops_frame_but_stays_alive() {
        let (handle, _rx) = make_handle(1);
        assert!(handle.send(OutboundMessage::Ping { timestamp: 1 }));
        assert!(!handle.send(OutboundMessage::Ping { timestamp: 2 }));
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_closed_queue_marks_dead() {
        let (handle, rx) = make_handle(1);
        drop(rx);
        assert!(!handle.send(OutboundMessage::Ping { timestamp: 1 }));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_staleness_tracks_pongs() {
        let (handle, _rx) = make_handle(1);
        assert!(!handle.is_stale(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_stale(Duration::from_millis(1)));

        handle.record_pong();
        assert!(!handle.is_stale(Duration::from_secs(60)));
    }
}
