//! A single connected socket's handle: the sender half used to push frames
//! to it, plus the activity bookkeeping the heartbeat sweep reads.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::message::OutboundMessage;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection channel closed")]
    Closed,
}

/// One authenticated socket connection. `user_id` is populated only after
/// the client completes the post-connect `authenticate` handshake.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
}

impl ConnectionHandle {
    pub fn new(id: Uuid, user_id: String, sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            sender,
            connected_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Acquire))
            .unwrap_or(self.connected_at)
    }

    pub fn is_stale(&self, timeout: chrono::Duration) -> bool {
        Utc::now() - self.last_activity() > timeout
    }

    pub async fn send(&self, msg: OutboundMessage) -> Result<(), SendError> {
        self.sender.send(msg).await.map_err(|_| SendError::Closed)
    }

    pub fn try_send(&self, msg: OutboundMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|_| SendError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn touch_advances_last_activity() {
        let (tx, _rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(Uuid::new_v4(), "u1".into(), tx);
        let before = handle.last_activity();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        handle.touch();
        assert!(handle.last_activity() >= before);
    }

    #[tokio::test]
    async fn send_fails_once_receiver_dropped() {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(Uuid::new_v4(), "u1".into(), tx);
        drop(rx);
        let result = handle.send(OutboundMessage::Typed(
            crate::socket::ServerMessage::Pong,
        )).await;
        assert!(result.is_err());
    }
}
