//! Per-instance connection registry. Unlike a general-purpose connection
//! pool, this one enforces a single live session per user: registering a new
//! connection for a user id evicts whatever connection that user already
//! held on this instance.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use uuid::Uuid;

use super::connection::ConnectionHandle;
use super::message::{OutboundMessage, ServerMessage};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    pub total_connections: usize,
}

/// Holds every connection authenticated against this instance, indexed both
/// by connection id and by user id for single-session eviction and targeted
/// delivery.
#[derive(Default)]
pub struct ConnectionManager {
    by_id: DashMap<Uuid, Arc<ConnectionHandle>>,
    by_user: DashMap<String, Uuid>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` for its user, evicting and returning any prior
    /// connection that user held on this instance (the caller is expected to
    /// close it after sending a replacement notice, if any).
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let user_id = handle.user_id.clone();
        let id = handle.id;

        let previous = self
            .by_user
            .insert(user_id, id)
            .and_then(|prev_id| self.by_id.remove(&prev_id))
            .map(|(_, handle)| handle);

        self.by_id.insert(id, handle);
        previous
    }

    pub fn unregister(&self, id: Uuid) {
        if let Some((_, handle)) = self.by_id.remove(&id) {
            self.by_user.remove_if(&handle.user_id, |_, cur| *cur == id);
        }
    }

    pub fn get_by_user(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        let id = *self.by_user.get(user_id)?;
        self.by_id.get(&id).map(|entry| entry.clone())
    }

    pub fn is_user_connected(&self, user_id: &str) -> bool {
        self.by_user.contains_key(user_id)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.by_id.len(),
        }
    }

    /// Delivers `msg` to `user_id`'s connection on this instance, if any.
    /// Returns `true` if a local connection accepted the send.
    pub async fn send_to_user(&self, user_id: &str, msg: OutboundMessage) -> bool {
        match self.get_by_user(user_id) {
            Some(handle) => handle.send(msg).await.is_ok(),
            None => false,
        }
    }

    /// Fans `msg` out to every connection on this instance, pre-serializing
    /// once rather than per recipient.
    pub async fn broadcast(&self, msg: &ServerMessage) {
        let Ok(pre) = OutboundMessage::pre_serialize(msg) else {
            return;
        };
        for entry in self.by_id.iter() {
            let _ = entry.value().try_send(pre.clone());
        }
    }

    /// Drops connections that have not sent anything (including `ping`) in
    /// over `timeout`. Returns the number of connections closed.
    pub fn cleanup_stale(&self, timeout: Duration) -> usize {
        let stale_ids: Vec<Uuid> = self
            .by_id
            .iter()
            .filter(|entry| entry.value().is_stale(timeout))
            .map(|entry| *entry.key())
            .collect();

        for id in &stale_ids {
            self.unregister(*id);
        }
        stale_ids.len()
    }
}
