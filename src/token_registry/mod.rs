//! FCM device-token registry: register/refresh/remove, resolve a user's
//! currently-resolvable tokens, and record provider errors against them.
//! Mirrors the shape of [`crate::store`] — one trait, an in-memory
//! implementation for tests, a Postgres-backed one for production.

mod memory;
mod postgres_registry;

pub use memory::InMemoryTokenRegistry;
pub use postgres_registry::PostgresTokenRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::token::{DeviceInfo, FcmToken};

#[derive(Debug, Error)]
pub enum TokenRegistryError {
    #[error("token not found")]
    NotFound,
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Registers a new token, or touches it (reassigning `user_id` if it
    /// changed) if the token string already exists.
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        device_info: DeviceInfo,
    ) -> Result<FcmToken, TokenRegistryError>;

    async fn refresh(
        &self,
        id: Uuid,
        new_token: &str,
    ) -> Result<FcmToken, TokenRegistryError>;

    async fn remove(&self, id: Uuid) -> Result<(), TokenRegistryError>;

    async fn get(&self, id: Uuid) -> Result<Option<FcmToken>, TokenRegistryError>;

    async fn for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError>;

    /// Every resolvable (active, non-stale, unexpired) token for a user —
    /// the set a push worker actually sends to.
    async fn resolvable_for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError>;

    async fn record_provider_error(
        &self,
        id: Uuid,
        code: &str,
        message: String,
    ) -> Result<(), TokenRegistryError>;

    /// Records one delivery attempt against a token: `sent` always
    /// increments, and `delivered`/`failed` split on the provider's
    /// per-token disposition.
    async fn record_attempt(&self, id: Uuid, delivered: bool) -> Result<(), TokenRegistryError>;

    /// Marks tokens inactive for 30+ days stale; returns the count swept.
    async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<u64, TokenRegistryError>;

    /// Deletes tokens past `expires_at`; returns the count removed.
    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: i64) -> Result<u64, TokenRegistryError>;

    /// Looks a token up by its raw string value, for the `DELETE :token` route.
    async fn find_by_token(&self, token: &str) -> Result<Option<FcmToken>, TokenRegistryError>;

    async fn stats(&self) -> Result<TokenRegistryStats, TokenRegistryError>;
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TokenRegistryStats {
    pub total: u64,
    pub active: u64,
    pub stale: u64,
    pub expired: u64,
}
