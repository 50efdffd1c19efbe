//! Business-event ingestion and the mirror-summary read routes that hang
//! off each originating entity.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Channel, Context, MirrorSummary};
use crate::error::{AppError, Result};
use crate::orchestrator::ChannelOutcome;
use crate::server::AppState;

#[derive(Serialize)]
struct OutcomeResponse {
    tracking_id: Option<Uuid>,
    state: &'static str,
    reason: Option<String>,
}

impl From<&ChannelOutcome> for OutcomeResponse {
    fn from(outcome: &ChannelOutcome) -> Self {
        match outcome {
            ChannelOutcome::Enqueued { tracking_id } => OutcomeResponse {
                tracking_id: Some(*tracking_id),
                state: "enqueued",
                reason: None,
            },
            ChannelOutcome::QueueFailed { tracking_id, reason } => OutcomeResponse {
                tracking_id: Some(*tracking_id),
                state: "queue_failed",
                reason: Some(reason.clone()),
            },
            ChannelOutcome::PersistFailed { reason } => OutcomeResponse {
                tracking_id: None,
                state: "persist_failed",
                reason: Some(reason.clone()),
            },
        }
    }
}

fn outcomes_to_json(outcomes: &HashMap<Channel, ChannelOutcome>) -> serde_json::Value {
    let map: HashMap<&'static str, OutcomeResponse> = outcomes
        .iter()
        .map(|(channel, outcome)| (channel.as_str(), OutcomeResponse::from(outcome)))
        .collect();
    serde_json::json!({ "channels": map })
}

fn context_for(state: &AppState, source_entity_id: &str, source_entity_type: &str, endpoint: &str) -> Context {
    Context::new(state.settings.server.instance_id.clone(), source_entity_id, source_entity_type, endpoint)
}

#[derive(Deserialize)]
pub struct SignupRequest {
    user_id: String,
    username: String,
    email: String,
}

pub async fn create_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<serde_json::Value>> {
    if req.user_id.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::Validation("user_id and email are required".into()));
    }
    let event_id = Uuid::new_v4();
    let context = context_for(&state, &event_id.to_string(), "signup", "/signups");
    let outcomes = state
        .orchestrator
        .submit_signup(&context, event_id, &req.user_id, &req.username, &req.email)
        .await;
    Ok(Json(outcomes_to_json(&outcomes)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    user_id: String,
    email: String,
    username: String,
    ip: Option<String>,
}

pub async fn create_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let event_id = Uuid::new_v4();
    let context = context_for(&state, &event_id.to_string(), "login", "/logins");
    let outcomes = state
        .orchestrator
        .submit_login(&context, event_id, &req.user_id, &req.email, &req.username, req.ip.as_deref())
        .await;
    Ok(Json(outcomes_to_json(&outcomes)))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    user_id: String,
    email: String,
    username: String,
    reset_token: String,
}

pub async fn create_reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let event_id = Uuid::new_v4();
    let context = context_for(&state, &event_id.to_string(), "reset_password", "/reset-passwords");
    let outcomes = state
        .orchestrator
        .submit_reset_password(&context, event_id, &req.user_id, &req.email, &req.username, &req.reset_token)
        .await;
    Ok(Json(outcomes_to_json(&outcomes)))
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    user_id: String,
    order_id: String,
    total_amount: f64,
    currency: String,
}

pub async fn create_purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<serde_json::Value>> {
    let event_id = Uuid::new_v4();
    let context = context_for(&state, &req.order_id, "purchase", "/purchases");
    let outcomes = state
        .orchestrator
        .submit_purchase(&context, event_id, &req.user_id, &req.order_id, req.total_amount, &req.currency)
        .await;
    Ok(Json(outcomes_to_json(&outcomes)))
}

#[derive(Deserialize)]
pub struct FriendRequestRequest {
    from_user_id: String,
    to_user_id: String,
}

pub async fn create_friend_request(
    State(state): State<AppState>,
    Json(req): Json<FriendRequestRequest>,
) -> Result<Json<serde_json::Value>> {
    let event_id = Uuid::new_v4();
    let context = context_for(&state, &event_id.to_string(), "friend_request", "/friend-requests");
    let outcomes = state
        .orchestrator
        .submit_friend_request(&context, event_id, &req.from_user_id, &req.to_user_id)
        .await;
    Ok(Json(outcomes_to_json(&outcomes)))
}

/// Mirror summaries are keyed by the tracking record's own id — the
/// business-entity structs they logically belong to are never persisted,
/// only the mirror row the orchestrator/workers write on each transition.
async fn mirror_status(state: &AppState, entity_type: &str, tracking_id: Uuid) -> Result<Json<MirrorSummary>> {
    let summary = state
        .store
        .get_mirror(entity_type, &tracking_id.to_string())
        .await?
        .ok_or_else(|| AppError::NotFound("no delivery status recorded for this id".into()))?;
    Ok(Json(summary))
}

pub async fn welcome_email_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "email_notification", id).await
}

pub async fn login_alert_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "email_notification", id).await
}

pub async fn login_in_app_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "in_app_notification", id).await
}

pub async fn reset_password_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "email_notification", id).await
}

pub async fn purchase_push_mirror_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "push_notification", id).await
}

pub async fn friend_request_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MirrorSummary>> {
    mirror_status(&state, "in_app_notification", id).await
}
