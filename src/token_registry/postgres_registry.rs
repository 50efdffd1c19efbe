//! PostgreSQL-backed `TokenRegistry`. One JSONB document per token, plus
//! narrow indexed columns for the predicates actually filtered on.
//!
//! ```sql
//! CREATE TABLE fcm_tokens (
//!     id UUID PRIMARY KEY,
//!     user_id TEXT NOT NULL,
//!     token TEXT NOT NULL,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     is_stale BOOLEAN NOT NULL DEFAULT FALSE,
//!     expires_at TIMESTAMPTZ NOT NULL,
//!     document JSONB NOT NULL,
//!     UNIQUE (token)
//! );
//! CREATE INDEX ON fcm_tokens (user_id, is_active, is_stale, expires_at);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::token::{DeviceInfo, FcmToken};
use crate::postgres::PostgresPool;

use super::{TokenRegistry, TokenRegistryError, TokenRegistryStats};

pub struct PostgresTokenRegistry {
    pool: PostgresPool,
}

impl PostgresTokenRegistry {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: Uuid) -> Result<FcmToken, TokenRegistryError> {
        let row = sqlx::query("SELECT document FROM fcm_tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?
            .ok_or(TokenRegistryError::NotFound)?;
        let doc: serde_json::Value = row.try_get("document")?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn save(&self, token: &FcmToken) -> Result<(), TokenRegistryError> {
        let document = serde_json::to_value(token)?;
        sqlx::query(
            "INSERT INTO fcm_tokens (id, user_id, token, is_active, is_stale, expires_at, document)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE
             SET user_id = $2, token = $3, is_active = $4, is_stale = $5, expires_at = $6, document = $7",
        )
        .bind(token.id)
        .bind(&token.user_id)
        .bind(&token.token)
        .bind(token.is_active)
        .bind(token.is_stale)
        .bind(token.expires_at)
        .bind(document)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenRegistry for PostgresTokenRegistry {
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        device_info: DeviceInfo,
    ) -> Result<FcmToken, TokenRegistryError> {
        let row = sqlx::query("SELECT document FROM fcm_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(self.pool.pool())
            .await?;

        let now = Utc::now();
        let record: FcmToken = match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("document")?;
                let mut record: FcmToken = serde_json::from_value(doc)?;
                if record.user_id != user_id {
                    tracing::info!(
                        token_id = %record.id,
                        old_user_id = %record.user_id,
                        new_user_id = %user_id,
                        "reassigning fcm token to new user"
                    );
                    record.reassign_user(user_id.to_string(), now);
                } else {
                    record.touch(now);
                }
                record.device_info = device_info;
                record
            }
            None => FcmToken::new(user_id.to_string(), token.to_string(), device_info),
        };
        self.save(&record).await?;
        Ok(record)
    }

    async fn refresh(&self, id: Uuid, new_token: &str) -> Result<FcmToken, TokenRegistryError> {
        let mut record = self.load(id).await?;
        record.refresh(new_token.to_string(), Utc::now());
        self.save(&record).await?;
        Ok(record)
    }

    async fn remove(&self, id: Uuid) -> Result<(), TokenRegistryError> {
        sqlx::query("DELETE FROM fcm_tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FcmToken>, TokenRegistryError> {
        match self.load(id).await {
            Ok(t) => Ok(Some(t)),
            Err(TokenRegistryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError> {
        let rows = sqlx::query("SELECT document FROM fcm_tokens WHERE user_id = $1")
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

    async fn resolvable_for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError> {
        let rows = sqlx::query(
            "SELECT document FROM fcm_tokens
             WHERE user_id = $1 AND is_active = TRUE AND is_stale = FALSE AND expires_at > now()",
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

    async fn record_provider_error(
        &self,
        id: Uuid,
        code: &str,
        message: String,
    ) -> Result<(), TokenRegistryError> {
        let mut record = self.load(id).await?;
        record.record_provider_error(code, message, Utc::now());
        self.save(&record).await
    }

    async fn record_attempt(&self, id: Uuid, delivered: bool) -> Result<(), TokenRegistryError> {
        let mut record = self.load(id).await?;
        record.record_attempt(delivered, Utc::now());
        self.save(&record).await
    }

    async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<u64, TokenRegistryError> {
        let result = sqlx::query(
            "UPDATE fcm_tokens
             SET is_stale = TRUE, is_active = FALSE,
                 document = jsonb_set(jsonb_set(document, '{is_stale}', 'true'::jsonb), '{is_active}', 'false'::jsonb)
             WHERE is_stale = FALSE AND $1 - (document->>'last_activity_at')::timestamptz >= interval '30 days'",
        )
        .bind(now)
        .execute(self.pool.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: i64) -> Result<u64, TokenRegistryError> {
        let result = sqlx::query(
            "DELETE FROM fcm_tokens WHERE id IN (
                SELECT id FROM fcm_tokens WHERE expires_at < $1 LIMIT $2
             )",
        )
        .bind(now)
        .bind(batch_size)
        .execute(self.pool.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<FcmToken>, TokenRegistryError> {
        let row = sqlx::query("SELECT document FROM fcm_tokens WHERE token = $1")
            .bind(token)
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

    async fn stats(&self) -> Result<TokenRegistryStats, TokenRegistryError> {
        let row = sqlx::query(
            "SELECT
                count(*) AS total,
                count(*) FILTER (WHERE is_active) AS active,
                count(*) FILTER (WHERE is_stale) AS stale,
                count(*) FILTER (WHERE expires_at < now()) AS expired
             FROM fcm_tokens",
        )
        .fetch_one(self.pool.pool())
        .await?;
        Ok(TokenRegistryStats {
            total: row.try_get::<i64, _>("total")? as u64,
            active: row.try_get::<i64, _>("active")? as u64,
            stale: row.try_get::<i64, _>("stale")? as u64,
            expired: row.try_get::<i64, _>("expired")? as u64,
        })
    }
}
