//! Persistent-store abstraction over the per-channel tracking records and
//! the mirror summaries they hang off originating business entities.
//!
//! Backed by PostgreSQL in production (JSONB-column document tables,
//! matching the donor's `postgres_backend` shape) and by an in-memory
//! implementation for tests and local development.

mod memory;
mod postgres_store;

pub use memory::InMemoryStore;
pub use postgres_store::PostgresStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{EmailNotification, InAppNotification, MirrorSummary, PushNotification};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// CRUD over the tracking-record and mirror tables. Every write is scoped
/// to a single record; cross-record consistency is the caller's job
/// (tracking-record write happens-before mirror write, per the orchestrator
/// and worker update order).
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_email(&self, notification: EmailNotification) -> Result<(), StoreError>;
    async fn get_email(&self, id: Uuid) -> Result<Option<EmailNotification>, StoreError>;
    async fn update_email(&self, notification: &EmailNotification) -> Result<(), StoreError>;

    async fn create_in_app(&self, notification: InAppNotification) -> Result<(), StoreError>;
    async fn get_in_app(&self, id: Uuid) -> Result<Option<InAppNotification>, StoreError>;
    async fn update_in_app(&self, notification: &InAppNotification) -> Result<(), StoreError>;
    /// Not-yet-expired, not-yet-delivered records for a user, oldest first.
    async fn pending_for_user(&self, user_id: &str) -> Result<Vec<InAppNotification>, StoreError>;
    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<(), StoreError>;

    async fn create_push(&self, notification: PushNotification) -> Result<(), StoreError>;
    async fn get_push(&self, id: Uuid) -> Result<Option<PushNotification>, StoreError>;
    async fn update_push(&self, notification: &PushNotification) -> Result<(), StoreError>;
    /// Looks up a push tracking record by its originating business entity's
    /// id (`source.reference_id`), for the purchase-status route.
    async fn find_push_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<PushNotification>, StoreError>;

    /// Upserts the mirror summary on `(entity_type, entity_id)`.
    async fn upsert_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
        summary: &MirrorSummary,
    ) -> Result<(), StoreError>;
    async fn get_mirror(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<MirrorSummary>, StoreError>;

    /// Deletes delivered/failed tracking records older than `before`, up to
    /// `batch_size` per table. Returns the total number removed.
    async fn delete_terminal_records_older_than(
        &self,
        before: chrono::DateTime<chrono::Utc>,
        batch_size: i64,
    ) -> Result<u64, StoreError>;
}
