//! `/push-notifications` — read/update surface over push tracking records.
//! Records are only ever created by the orchestrator's `submit_purchase`
//! path; this surface is for status lookups and delivery-status updates.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::tracking::PushStatus;
use crate::domain::PushNotification;
use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Serialize)]
pub struct PushNotificationResponse {
    id: Uuid,
    recipient_user_id: String,
    title: String,
    body: String,
    status: PushStatus,
    attempts: u32,
    delivered: bool,
    clicked: bool,
    failed: bool,
}

impl From<PushNotification> for PushNotificationResponse {
    fn from(n: PushNotification) -> Self {
        Self {
            id: n.id,
            recipient_user_id: n.recipient_user_id,
            title: n.title,
            body: n.body,
            status: n.status,
            attempts: n.attempts,
            delivered: n.delivery_status.delivered,
            clicked: n.delivery_status.clicked,
            failed: n.delivery_status.failed,
        }
    }
}

pub async fn get_push_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PushNotificationResponse>> {
    let record = state
        .store
        .get_push(id)
        .await?
        .ok_or_else(|| AppError::NotFound("push notification not found".into()))?;
    Ok(Json(record.into()))
}

#[derive(Deserialize)]
pub struct DeliveryStatusUpdate {
    delivered: Option<bool>,
    failed: Option<bool>,
}

pub async fn update_delivery_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<DeliveryStatusUpdate>,
) -> Result<Json<PushNotificationResponse>> {
    let mut record = state
        .store
        .get_push(id)
        .await?
        .ok_or_else(|| AppError::NotFound("push notification not found".into()))?;

    let now = Utc::now();
    if let Some(true) = body.delivered {
        record.delivery_status.delivered = true;
        record.status = PushStatus::Delivered;
        record.timestamps.delivered_at = Some(now);
    }
    if let Some(true) = body.failed {
        record.delivery_status.failed = true;
        record.status = PushStatus::Failed;
        record.timestamps.failed_at = Some(now);
    }

    state.store.update_push(&record).await?;
    Ok(Json(record.into()))
}

pub async fn mark_clicked(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PushNotificationResponse>> {
    let mut record = state
        .store
        .get_push(id)
        .await?
        .ok_or_else(|| AppError::NotFound("push notification not found".into()))?;

    record.delivery_status.clicked = true;
    record.status = PushStatus::Clicked;
    record.timestamps.clicked_at = Some(Utc::now());
    state.store.update_push(&record).await?;
    Ok(Json(record.into()))
}

pub async fn purchase_status(
    State(state): State<AppState>,
    Path(purchase_id): Path<String>,
) -> Result<Json<PushNotificationResponse>> {
    let record = state
        .store
        .find_push_by_reference(&purchase_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no push notification for this purchase".into()))?;
    Ok(Json(record.into()))
}
