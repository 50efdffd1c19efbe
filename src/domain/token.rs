//! `FcmToken` — device-token lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Android,
    Ios,
}

/// Kept as an alias: the donor's device-metadata modules used the longer
/// name; both spellings show up across the pack so this keeps call sites
/// readable without re-deriving the enum.
pub type DevicePlatform = Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: Platform,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_model: Option<String>,
    pub app_version: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenPermissions {
    pub push: bool,
    pub email: bool,
    pub in_app: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    pub sent: u64,
    pub delivered: u64,
    pub clicked: u64,
    pub failed: u64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_delivered_at: Option<DateTime<Utc>>,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub last_failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenError {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

/// Provider error codes that immediately mark a token stale
pub const STALE_ON_ERROR_CODES: [&str; 3] = [
    "invalid-registration-token",
    "registration-token-not-registered",
    "mismatch-sender-id",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmToken {
    pub id: Uuid,
    pub user_id: String,
    pub token: String,
    pub device_info: DeviceInfo,
    pub permissions: TokenPermissions,
    pub is_active: bool,
    pub is_stale: bool,
    pub last_activity_at: DateTime<Utc>,
    pub refresh_count: u32,
    pub notification_stats: NotificationStats,
    pub errors: Vec<TokenError>,
    pub expires_at: DateTime<Utc>,
}

impl FcmToken {
    /// Inactivity window after which a token is swept stale.
    pub const STALE_AFTER_DAYS: i64 = 30;

    pub fn new(user_id: String, token: String, device_info: DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            device_info,
            permissions: TokenPermissions::default(),
            is_active: true,
            is_stale: false,
            last_activity_at: now,
            refresh_count: 0,
            notification_stats: NotificationStats::default(),
            errors: Vec::new(),
            expires_at: now + Duration::days(Self::STALE_AFTER_DAYS),
        }
    }

    /// Re-registration of an existing token bumps activity and resets the
    /// expiry clock; the invariant `expires_at = last_activity_at + 30d`
    /// holds at every write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
        self.expires_at = now + Duration::days(Self::STALE_AFTER_DAYS);
    }

    pub fn refresh(&mut self, new_token: String, now: DateTime<Utc>) {
        self.token = new_token;
        self.refresh_count += 1;
        self.touch(now);
    }

    /// A token string handed to a different user (e.g. a shared/recycled
    /// device) moves with it rather than creating a duplicate row.
    pub fn reassign_user(&mut self, user_id: String, now: DateTime<Utc>) {
        self.user_id = user_id;
        self.touch(now);
    }

    pub fn mark_stale(&mut self) {
        self.is_stale = true;
        self.is_active = false;
    }

    pub fn sweep_stale_if_inactive(&mut self, now: DateTime<Utc>) {
        if !self.is_stale && now - self.last_activity_at >= Duration::days(Self::STALE_AFTER_DAYS)
        {
            self.mark_stale();
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Per-token bookkeeping for one delivery attempt: `sent` always moves,
    /// `delivered`/`failed` split on whether the provider accepted it.
    pub fn record_attempt(&mut self, delivered: bool, now: DateTime<Utc>) {
        self.notification_stats.sent += 1;
        self.notification_stats.last_sent_at = Some(now);
        if delivered {
            self.notification_stats.delivered += 1;
            self.notification_stats.last_delivered_at = Some(now);
        } else {
            self.notification_stats.failed += 1;
            self.notification_stats.last_failed_at = Some(now);
        }
    }

    pub fn record_provider_error(&mut self, code: &str, message: String, now: DateTime<Utc>) {
        self.errors.push(TokenError {
            code: code.to_string(),
            message,
            timestamp: now,
            resolved: false,
        });
        if STALE_ON_ERROR_CODES.contains(&code) {
            self.mark_stale();
        }
    }

    /// Active-for-delivery predicate used when resolving targets for a user.
    pub fn is_resolvable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_stale && self.expires_at > now
    }
}
