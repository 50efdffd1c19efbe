//! PostgreSQL-backed `NotificationStore`. Each tracking-record table stores
//! its row as a single JSONB document keyed by primary id, with narrow
//! indexed columns for the predicates the store actually filters on. No
//! migration runner ships; the DDL below is the source of truth for what
//! a deployment must apply by hand.
//!
//! ```sql
//! CREATE TABLE email_notifications (
//!     id UUID PRIMARY KEY,
//!     recipient_user_id TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL,
//!     document JSONB NOT NULL
//! );
//! CREATE INDEX ON email_notifications (status, updated_at);
//!
//! CREATE TABLE in_app_notifications (
//!     id UUID PRIMARY KEY,
//!     recipient_user_id TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     is_read BOOLEAN NOT NULL DEFAULT FALSE,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     document JSONB NOT NULL
//! );
//! CREATE INDEX ON in_app_notifications (recipient_user_id, status, expires_at);
//!
//! CREATE TABLE push_notifications (
//!     id UUID PRIMARY KEY,
//!     recipient_user_id TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     document JSONB NOT NULL
//! );
//! CREATE INDEX ON push_notifications (status, created_at);
//!
//! CREATE TABLE notification_mirrors (
//!     entity_type TEXT NOT NULL,
//!     entity_id TEXT NOT NULL,
//!     document JSONB NOT NULL,
//!     PRIMARY KEY (entity_type, entity_id)
//! );
//! ```

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{EmailNotification, InAppNotification, InAppStatus, MirrorSummary, PushNotification, PushStatus};
use crate::postgres::PostgresPool;

use super::{NotificationStore, StoreError};

pub struct PostgresStore {
    pool: PostgresPool,
}

impl PostgresStore {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn create_email(&self, notification: EmailNotification) -> Result<(), StoreError> {
        let document = serde_json::to_value(&notification)?;
        sqlx::query(
            "INSERT INTO email_notifications (id, recipient_user_id, status, updated_at, document)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET status = $3, updated_at = $4, document = $5",
        )
        .bind(notification.id)
        .bind(&notification.recipient.user_id)
        .bind(format!("{:?}", notification.status).to_lowercase())
        .bind(notification.updated_at)
        .bind(document)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_email(&self, id: Uuid) -> Result<Option<EmailNotification>, StoreError> {
        let row = sqlx::query("SELECT document FROM email_notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn update_email(&self, notification: &EmailNotification) -> Result<(), StoreError> {
        self.create_email(notification.clone()).await
    }

    async fn create_in_app(&self, notification: InAppNotification) -> Result<(), StoreError> {
        let document = serde_json::to_value(&notification)?;
        sqlx::query(
            "INSERT INTO in_app_notifications (id, recipient_user_id, status, is_read, expires_at, created_at, document)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET status = $3, is_read = $4, expires_at = $5, document = $7",
        )
        .bind(notification.id)
        .bind(&notification.recipient_user_id)
        .bind(format!("{:?}", notification.status).to_lowercase())
        .bind(notification.is_read)
        .bind(notification.expires_at)
        .bind(notification.created_at)
        .bind(document)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_in_app(&self, id: Uuid) -> Result<Option<InAppNotification>, StoreError> {
        let row = sqlx::query("SELECT document FROM in_app_notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn update_in_app(&self, notification: &InAppNotification) -> Result<(), StoreError> {
        self.create_in_app(notification.clone()).await
    }

    async fn pending_for_user(&self, user_id: &str) -> Result<Vec<InAppNotification>, StoreError> {
        let rows = sqlx::query(
            "SELECT document FROM in_app_notifications
             WHERE recipient_user_id = $1 AND status NOT IN ('delivered', 'expired') AND expires_at > now()
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(serde_json::from_value(doc)?)
            })
            .collect()
    }

    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE in_app_notifications
             SET document = jsonb_set(document, '{is_read}', 'true'::jsonb)
             WHERE recipient_user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn create_push(&self, notification: PushNotification) -> Result<(), StoreError> {
        let document = serde_json::to_value(&notification)?;
        sqlx::query(
            "INSERT INTO push_notifications (id, recipient_user_id, status, created_at, document)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET status = $3, document = $5",
        )
        .bind(notification.id)
        .bind(&notification.recipient_user_id)
        .bind(format!("{:?}", notification.status).to_lowercase())
        .bind(notification.timestamps.last_attempt_at.unwrap_or_else(chrono::Utc::now))
        .bind(document)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_push(&self, id: Uuid) -> Result<Option<PushNotification>, StoreError> {
        let row = sqlx::query("SELECT document FROM push_notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn update_push(&self, notification: &PushNotification) -> Result<(), StoreError> {
        self.create_push(notification.clone()).await
    }

    async fn find_push_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<PushNotification>, StoreError> {
        let row = sqlx::query(
            "SELECT document FROM push_notifications WHERE document->'source'->>'reference_id' = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(reference_id)
        .fetch_optional(self.pool.pool())
        .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
        summary: &MirrorSummary,
    ) -> Result<(), StoreError> {
        let document = serde_json::to_value(summary)?;
        sqlx::query(
            "INSERT INTO notification_mirrors (entity_type, entity_id, document)
             VALUES ($1, $2, $3)
             ON CONFLICT (entity_type, entity_id) DO UPDATE SET document = $3",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(document)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn get_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<MirrorSummary>, StoreError> {
        let row = sqlx::query(
            "SELECT document FROM notification_mirrors WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(self.pool.pool())
        .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_terminal_records_older_than(
        &self,
        before: chrono::DateTime<chrono::Utc>,
        batch_size: i64,
    ) -> Result<u64, StoreError> {
        let mut total = 0u64;

        let result = sqlx::query(
            "DELETE FROM email_notifications WHERE id IN (
                SELECT id FROM email_notifications
                WHERE status IN ('delivered', 'failed') AND updated_at < $1
                LIMIT $2
             )",
        )
        .bind(before)
        .bind(batch_size)
        .execute(self.pool.pool())
        .await?;
        total += result.rows_affected();

        let result = sqlx::query(
            "DELETE FROM in_app_notifications WHERE id IN (
                SELECT id FROM in_app_notifications
                WHERE status IN ('delivered', 'failed', 'expired') AND created_at < $1
                LIMIT $2
             )",
        )
        .bind(before)
        .bind(batch_size)
        .execute(self.pool.pool())
        .await?;
        total += result.rows_affected();

        let result = sqlx::query(
            "DELETE FROM push_notifications WHERE id IN (
                SELECT id FROM push_notifications
                WHERE status IN ('delivered', 'failed') AND created_at < $1
                LIMIT $2
             )",
        )
        .bind(before)
        .bind(batch_size)
        .execute(self.pool.pool())
        .await?;
        total += result.rows_affected();

        Ok(total)
    }
}

#[allow(unused)]
fn _assert_status_enums_exist(_: InAppStatus, _: PushStatus) {}
