//! Core domain types: event/channel taxonomy, tracking records, mirrors, and
//! the FCM token registry's row shape.

pub mod event;
pub mod mirror;
pub mod token;
pub mod tracking;

pub use event::{Channel, Context, EventType};
pub use mirror::{FriendRequest, Login, MirrorSummary, Purchase, ResetPassword, Signup};
pub use token::{DeviceInfo, DevicePlatform, FcmToken, NotificationStats, Platform, TokenError};
pub use tracking::{
    DeliveryHistoryEntry, EmailNotification, EmailStatus, EscalationHistoryEntry,
    InAppNotification, InAppStatus, Priority, PushDeliveryStatus, PushNotification, PushStatus,
    RetryHistoryEntry,
};
