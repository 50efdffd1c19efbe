//! Mirror fields on originating business entities. Each mirror is an
//! eventually consistent summary; only workers/the orchestrator write it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tracking::DeliveryHistoryEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSummary {
    pub status: String,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub queue_job_id: Option<String>,
    pub notification_id: Option<Uuid>,
    pub delivery_history: Vec<DeliveryHistoryEntry>,
}

impl MirrorSummary {
    pub fn pending() -> Self {
        Self {
            status: "pending".to_string(),
            attempts: 0,
            last_attempt_at: None,
            delivered_at: None,
            failed_at: None,
            failure_reason: None,
            queue_job_id: None,
            notification_id: None,
            delivery_history: Vec::new(),
        }
    }

    pub fn queue_failed(reason: impl Into<String>) -> Self {
        let mut m = Self::pending();
        m.status = "queue-failed".to_string();
        m.failure_reason = Some(reason.into());
        m
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub welcome_email: MirrorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
    pub id: Uuid,
    pub user_id: String,
    pub login_alert_email: MirrorSummary,
    pub login_in_app_notification: MirrorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub id: Uuid,
    pub user_id: String,
    pub email: String,
    pub reset_password_email: MirrorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub total_amount: f64,
    pub currency: String,
    pub purchase_push_notification: MirrorSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user_id: String,
    pub to_user_id: String,
    pub friend_request_in_app_notification: MirrorSummary,
}
