use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::token::{DeviceInfo, FcmToken};

use super::{TokenRegistry, TokenRegistryError, TokenRegistryStats};

#[derive(Default)]
pub struct InMemoryTokenRegistry {
    tokens: RwLock<HashMap<Uuid, FcmToken>>,
}

impl InMemoryTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRegistry for InMemoryTokenRegistry {
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        device_info: DeviceInfo,
    ) -> Result<FcmToken, TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        if let Some(existing) = tokens.values_mut().find(|t| t.token == token) {
            let now = Utc::now();
            if existing.user_id != user_id {
                tracing::info!(
                    token_id = %existing.id,
                    old_user_id = %existing.user_id,
                    new_user_id = %user_id,
                    "reassigning fcm token to new user"
                );
                existing.reassign_user(user_id.to_string(), now);
            } else {
                existing.touch(now);
            }
            existing.device_info = device_info;
            return Ok(existing.clone());
        }
        let created = FcmToken::new(user_id.to_string(), token.to_string(), device_info);
        tokens.insert(created.id, created.clone());
        Ok(created)
    }

    async fn refresh(&self, id: Uuid, new_token: &str) -> Result<FcmToken, TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        let record = tokens.get_mut(&id).ok_or(TokenRegistryError::NotFound)?;
        record.refresh(new_token.to_string(), Utc::now());
        Ok(record.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<(), TokenRegistryError> {
        self.tokens.write().unwrap().remove(&id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FcmToken>, TokenRegistryError> {
        Ok(self.tokens.read().unwrap().get(&id).cloned())
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn resolvable_for_user(&self, user_id: &str) -> Result<Vec<FcmToken>, TokenRegistryError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id && t.is_resolvable(now))
            .cloned()
            .collect())
    }

    async fn record_provider_error(
        &self,
        id: Uuid,
        code: &str,
        message: String,
    ) -> Result<(), TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        let record = tokens.get_mut(&id).ok_or(TokenRegistryError::NotFound)?;
        record.record_provider_error(code, message, Utc::now());
        Ok(())
    }

    async fn record_attempt(&self, id: Uuid, delivered: bool) -> Result<(), TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        let record = tokens.get_mut(&id).ok_or(TokenRegistryError::NotFound)?;
        record.record_attempt(delivered, Utc::now());
        Ok(())
    }

    async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<u64, TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        let mut count = 0;
        for t in tokens.values_mut() {
            if !t.is_stale {
                let was_stale = t.is_stale;
                t.sweep_stale_if_inactive(now);
                if !was_stale && t.is_stale {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, batch_size: i64) -> Result<u64, TokenRegistryError> {
        let mut tokens = self.tokens.write().unwrap();
        let expired: Vec<Uuid> = tokens
            .values()
            .filter(|t| t.is_expired(now))
            .take(batch_size.max(0) as usize)
            .map(|t| t.id)
            .collect();
        for id in &expired {
            tokens.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<FcmToken>, TokenRegistryError> {
        Ok(self
            .tokens
            .read()
            .unwrap()
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn stats(&self) -> Result<TokenRegistryStats, TokenRegistryError> {
        let now = Utc::now();
        let tokens = self.tokens.read().unwrap();
        let mut stats = TokenRegistryStats::default();
        for t in tokens.values() {
            stats.total += 1;
            if t.is_active {
                stats.active += 1;
            }
            if t.is_stale {
                stats.stale += 1;
            }
            if t.is_expired(now) {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo {
            platform: crate::domain::token::Platform::Web,
            browser: None,
            os: None,
            device_model: None,
            app_version: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn registering_same_token_twice_touches_instead_of_duplicating() {
        let registry = InMemoryTokenRegistry::new();
        registry.register("u1", "tok-1", device()).await.unwrap();
        registry.register("u1", "tok-1", device()).await.unwrap();
        assert_eq!(registry.for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolvable_for_user_excludes_stale_tokens() {
        let registry = InMemoryTokenRegistry::new();
        let t = registry.register("u1", "tok-1", device()).await.unwrap();
        registry
            .record_provider_error(t.id, "invalid-registration-token", "bad".into())
            .await
            .unwrap();
        assert!(registry.resolvable_for_user("u1").await.unwrap().is_empty());
    }
}
