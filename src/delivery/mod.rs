//! Outbound delivery clients for the external channels: SMTP for email,
//! FCM HTTP v1 for push.

mod fcm;
mod smtp;

pub use fcm::{FcmClient, FcmSendOutcome, FcmTokenDisposition};
pub use smtp::SmtpClient;
