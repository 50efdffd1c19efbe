//! Per-channel tracking records: the authoritative state of a single
//! delivery attempt lifecycle (one row per (event, channel)).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// A single retry attempt, as recorded onto `EmailNotification::retry_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHistoryEntry {
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub queue: String,
    pub error: Option<String>,
}

/// A single delivery attempt, as recorded onto `InAppNotification::delivery_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryHistoryEntry {
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub socket_id: Option<String>,
    pub delivery_method: String,
    pub queue: String,
}

/// One tier-to-tier escalation (e.g. primary to retry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationHistoryEntry {
    pub from_queue: String,
    pub to_queue: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailBody {
    pub html: String,
    pub text: String,
}

/// One row per email delivery attempt lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailNotification {
    pub id: Uuid,
    pub event_type: EventType,
    pub recipient: EmailRecipient,
    pub subject: String,
    pub body: EmailBody,
    pub status: EmailStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub current_queue_name: String,
    pub job_id: String,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub retry_history: Vec<RetryHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailNotification {
    pub fn new(
        event_type: EventType,
        recipient: EmailRecipient,
        subject: String,
        body: EmailBody,
        queue_name: String,
        job_id: String,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_type,
            recipient,
            subject,
            body,
            status: EmailStatus::Pending,
            attempts: 0,
            max_attempts,
            current_queue_name: queue_name,
            job_id,
            last_attempt_at: None,
            delivered_at: None,
            failed_at: None,
            failure_reason: None,
            retry_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Terminal once delivered, or failed with a recorded failure time.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EmailStatus::Delivered)
            || (self.status == EmailStatus::Failed && self.failed_at.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InAppStatus {
    Pending,
    Queued,
    Delivered,
    Failed,
    Expired,
}

/// One row per in-app delivery attempt lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub event_type: EventType,
    pub recipient_user_id: String,
    pub title: String,
    pub message: String,
    pub data: HashMap<String, serde_json::Value>,
    pub priority: Priority,
    pub status: InAppStatus,
    pub is_read: bool,
    pub socket_id: Option<String>,
    pub current_queue_name: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub delivery_history: Vec<DeliveryHistoryEntry>,
    pub escalation_history: Vec<EscalationHistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl InAppNotification {
    /// Default TTL for an undelivered in-app notification is 24h
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn new(
        event_type: EventType,
        recipient_user_id: String,
        title: String,
        message: String,
        data: HashMap<String, serde_json::Value>,
        priority: Priority,
        queue_name: String,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_type,
            recipient_user_id,
            title,
            message,
            data,
            priority,
            status: InAppStatus::Pending,
            is_read: false,
            socket_id: None,
            current_queue_name: queue_name,
            attempts: 0,
            max_attempts,
            expires_at: now + Duration::hours(Self::DEFAULT_TTL_HOURS),
            delivery_history: Vec::new(),
            escalation_history: Vec::new(),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Delivery requires a non-empty socket id and that the record has not
    /// yet expired.
    pub fn mark_delivered(&mut self, socket_id: String, now: DateTime<Utc>) {
        debug_assert!(!socket_id.is_empty());
        debug_assert!(now < self.expires_at);
        self.socket_id = Some(socket_id);
        self.status = InAppStatus::Delivered;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Pending,
    Processing,
    Sent,
    Delivered,
    Failed,
    Clicked,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushDeliveryStatus {
    pub sent: bool,
    pub delivered: bool,
    pub clicked: bool,
    pub failed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushTokenResult {
    pub token: String,
    pub success: bool,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub success_count: u32,
    pub failure_count: u32,
    pub per_token: Vec<PushTokenResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_id: String,
    pub reference_model: String,
    pub trigger_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushTimestamps {
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// One row per push delivery attempt lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotification {
    pub id: Uuid,
    pub event_type: EventType,
    pub recipient_user_id: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, serde_json::Value>,
    pub image_url: Option<String>,
    pub click_action: Option<String>,
    pub priority: Priority,
    pub status: PushStatus,
    pub delivery_status: PushDeliveryStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub current_queue_name: String,
    pub provider_response: Option<ProviderResponse>,
    pub source: PushSource,
    pub expires_at: DateTime<Utc>,
    pub timestamps: PushTimestamps,
}

impl PushNotification {
    /// Default TTL for a push notification is 7 days
    pub const DEFAULT_TTL_DAYS: i64 = 7;

    pub fn new(
        event_type: EventType,
        recipient_user_id: String,
        title: String,
        body: String,
        data: HashMap<String, serde_json::Value>,
        priority: Priority,
        source: PushSource,
        queue_name: String,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            recipient_user_id,
            title,
            body,
            data,
            image_url: None,
            click_action: None,
            priority,
            status: PushStatus::Pending,
            delivery_status: PushDeliveryStatus::default(),
            attempts: 0,
            max_attempts,
            current_queue_name: queue_name,
            provider_response: None,
            source,
            expires_at: Utc::now() + Duration::days(Self::DEFAULT_TTL_DAYS),
            timestamps: PushTimestamps::default(),
        }
    }
}
