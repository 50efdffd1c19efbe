//! `/fcm-tokens` — device-token registration surface backed by the token
//! registry.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::token::{DeviceInfo, FcmToken, TokenPermissions};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::token_registry::TokenRegistryStats;

#[derive(Deserialize)]
pub struct RegisterTokenRequest {
    user_id: String,
    token: String,
    device_info: DeviceInfo,
}

#[derive(Serialize)]
pub struct TokenResponse {
    id: Uuid,
    user_id: String,
    token: String,
    is_active: bool,
    is_stale: bool,
    permissions: TokenPermissions,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<FcmToken> for TokenResponse {
    fn from(t: FcmToken) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            token: t.token,
            is_active: t.is_active,
            is_stale: t.is_stale,
            permissions: t.permissions,
            expires_at: t.expires_at,
        }
    }
}

/// Minimum length of an FCM registration token's printable-ASCII body, per
/// the shape the push provider actually issues.
const MIN_TOKEN_LENGTH: usize = 100;

/// A printable-ASCII string (no control characters, no whitespace) of at
/// least [`MIN_TOKEN_LENGTH`] characters, matching the push provider's
/// token shape. Rejects malformed tokens before they ever reach the
/// registry.
fn is_well_formed_token(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LENGTH
        && token.chars().all(|c| c.is_ascii_graphic() || c == ' ')
        && !token.contains(' ')
}

pub async fn register_token(
    State(state): State<AppState>,
    Json(req): Json<RegisterTokenRequest>,
) -> Result<Json<TokenResponse>> {
    if req.user_id.trim().is_empty() || req.token.trim().is_empty() {
        return Err(AppError::Validation("user_id and token are required".into()));
    }
    if !is_well_formed_token(&req.token) {
        return Err(AppError::Validation(format!(
            "token must be a printable-ASCII string of at least {MIN_TOKEN_LENGTH} characters"
        )));
    }
    let token = state
        .token_registry
        .register(&req.user_id, &req.token, req.device_info)
        .await?;
    Ok(Json(token.into()))
}

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    id: Uuid,
    new_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>> {
    let token = state.token_registry.refresh(req.id, &req.new_token).await?;
    Ok(Json(token.into()))
}

pub async fn delete_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let existing = state
        .token_registry
        .find_by_token(&token)
        .await?
        .ok_or_else(|| AppError::NotFound("token not found".into()))?;
    state.token_registry.remove(existing.id).await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

pub async fn tokens_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TokenResponse>>> {
    let tokens = state.token_registry.for_user(&user_id).await?;
    Ok(Json(tokens.into_iter().map(TokenResponse::from).collect()))
}

pub async fn token_statistics(State(state): State<AppState>) -> Result<Json<TokenRegistryStats>> {
    Ok(Json(state.token_registry.stats().await?))
}

#[derive(Serialize)]
pub struct SweepResponse {
    swept: u64,
}

pub async fn mark_stale_sweep(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let swept = state.token_registry.sweep_stale(chrono::Utc::now()).await?;
    Ok(Json(SweepResponse { swept }))
}

#[derive(Serialize)]
pub struct CleanupResponse {
    removed: u64,
}

pub async fn cleanup_expired(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let removed = state
        .token_registry
        .delete_expired(chrono::Utc::now(), state.settings.cleanup.sweep_batch_size)
        .await?;
    Ok(Json(CleanupResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_token_is_rejected() {
        assert!(!is_well_formed_token("too-short"));
    }

    #[test]
    fn token_with_whitespace_is_rejected() {
        let token = format!("{} with a space", "a".repeat(100));
        assert!(!is_well_formed_token(&token));
    }

    #[test]
    fn long_printable_ascii_token_is_accepted() {
        let token = "a".repeat(140);
        assert!(is_well_formed_token(&token));
    }
}
