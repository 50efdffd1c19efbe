use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{EmailNotification, InAppNotification, InAppStatus, MirrorSummary, PushNotification};

use super::{NotificationStore, StoreError};

/// Plain in-process store, used by tests and local single-instance runs.
#[derive(Default)]
pub struct InMemoryStore {
    emails: RwLock<HashMap<Uuid, EmailNotification>>,
    in_app: RwLock<HashMap<Uuid, InAppNotification>>,
    push: RwLock<HashMap<Uuid, PushNotification>>,
    mirrors: RwLock<HashMap<(String, String), MirrorSummary>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn create_email(&self, notification: EmailNotification) -> Result<(), StoreError> {
        self.emails.write().unwrap().insert(notification.id, notification);
        Ok(())
    }

    async fn get_email(&self, id: Uuid) -> Result<Option<EmailNotification>, StoreError> {
        Ok(self.emails.read().unwrap().get(&id).cloned())
    }

    async fn update_email(&self, notification: &EmailNotification) -> Result<(), StoreError> {
        self.emails
            .write()
            .unwrap()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn create_in_app(&self, notification: InAppNotification) -> Result<(), StoreError> {
        self.in_app.write().unwrap().insert(notification.id, notification);
        Ok(())
    }

    async fn get_in_app(&self, id: Uuid) -> Result<Option<InAppNotification>, StoreError> {
        Ok(self.in_app.read().unwrap().get(&id).cloned())
    }

    async fn update_in_app(&self, notification: &InAppNotification) -> Result<(), StoreError> {
        self.in_app
            .write()
            .unwrap()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn pending_for_user(&self, user_id: &str) -> Result<Vec<InAppNotification>, StoreError> {
        let now = chrono::Utc::now();
        let mut pending: Vec<InAppNotification> = self
            .in_app
            .read()
            .unwrap()
            .values()
            .filter(|n| {
                n.recipient_user_id == user_id
                    && !matches!(n.status, InAppStatus::Delivered | InAppStatus::Expired)
                    && n.expires_at > now
            })
            .cloned()
            .collect();
        pending.sort_by_key(|n| n.created_at);
        Ok(pending)
    }

    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<(), StoreError> {
        let mut guard = self.in_app.write().unwrap();
        for id in ids {
            if let Some(n) = guard.get_mut(id) {
                if n.recipient_user_id == user_id {
                    n.is_read = true;
                }
            }
        }
        Ok(())
    }

    async fn create_push(&self, notification: PushNotification) -> Result<(), StoreError> {
        self.push.write().unwrap().insert(notification.id, notification);
        Ok(())
    }

    async fn get_push(&self, id: Uuid) -> Result<Option<PushNotification>, StoreError> {
        Ok(self.push.read().unwrap().get(&id).cloned())
    }

    async fn update_push(&self, notification: &PushNotification) -> Result<(), StoreError> {
        self.push
            .write()
            .unwrap()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find_push_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<PushNotification>, StoreError> {
        Ok(self
            .push
            .read()
            .unwrap()
            .values()
            .find(|n| n.source.reference_id == reference_id)
            .cloned())
    }

    async fn upsert_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
        summary: &MirrorSummary,
    ) -> Result<(), StoreError> {
        self.mirrors
            .write()
            .unwrap()
            .insert((entity_type.to_string(), entity_id.to_string()), summary.clone());
        Ok(())
    }

    async fn get_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<MirrorSummary>, StoreError> {
        Ok(self
            .mirrors
            .read()
            .unwrap()
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned())
    }

    async fn delete_terminal_records_older_than(
        &self,
        before: chrono::DateTime<chrono::Utc>,
        batch_size: i64,
    ) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        let limit = batch_size.max(0) as usize;

        let mut emails = self.emails.write().unwrap();
        let stale: Vec<Uuid> = emails
            .values()
            .filter(|n| n.is_terminal() && n.updated_at < before)
            .take(limit)
            .map(|n| n.id)
            .collect();
        for id in stale {
            emails.remove(&id);
            removed += 1;
        }
        drop(emails);

        let mut in_app = self.in_app.write().unwrap();
        let stale: Vec<Uuid> = in_app
            .values()
            .filter(|n| matches!(n.status, InAppStatus::Delivered | InAppStatus::Failed | InAppStatus::Expired))
            .filter(|n| n.created_at < before)
            .take(limit)
            .map(|n| n.id)
            .collect();
        for id in stale {
            in_app.remove(&id);
            removed += 1;
        }
        drop(in_app);

        let mut push = self.push.write().unwrap();
        let stale: Vec<Uuid> = push
            .values()
            .filter(|n| matches!(n.status, crate::domain::PushStatus::Delivered | crate::domain::PushStatus::Failed))
            .filter(|n| {
                let reference = n
                    .timestamps
                    .last_attempt_at
                    .unwrap_or(n.expires_at - chrono::Duration::days(PushNotification::DEFAULT_TTL_DAYS));
                reference < before
            })
            .take(limit)
            .map(|n| n.id)
            .collect();
        for id in stale {
            push.remove(&id);
            removed += 1;
        }

        Ok(removed)
    }
}
