//! Notification Orchestrator: the single write path from a business event to
//! per-channel tracking records and their queued delivery jobs.
//!
//! Channel fan-out follows the fixed `EventType::enabled_channels()` mapping
//! with no dynamic subscription layer. Persistence failure for a channel
//! means nothing is enqueued for it and the caller is told; an enqueue
//! failure that happens after the tracking record was persisted does not
//! fail the caller — the record is marked `queue-failed` in its mirror and
//! the orchestrator moves on to the next channel.

mod content;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    Channel, Context, EmailBody, EmailNotification, EmailRecipient, EventType, InAppNotification,
    MirrorSummary, Priority, PushNotification, PushSource,
};
use crate::queue::{ChannelFamily, EnqueueOptions, JobEnvelope, QueueSubstrate, QueueTopology, Tier};
use crate::store::NotificationStore;

pub use content::{EmailContent, InAppContent, PushContent};

/// Per-channel result of one orchestrator submission.
#[derive(Debug, Clone)]
pub enum ChannelOutcome {
    /// Tracking record persisted and a job enqueued for it.
    Enqueued { tracking_id: Uuid },
    /// Tracking record persisted, but the queue substrate rejected the job.
    /// The mirror is written `queue-failed`; this is not surfaced as an
    /// orchestrator-level error.
    QueueFailed { tracking_id: Uuid, reason: String },
    /// The tracking record itself could not be persisted; nothing was
    /// enqueued for this channel.
    PersistFailed { reason: String },
}

pub struct Orchestrator {
    store: Arc<dyn NotificationStore>,
    substrate: Arc<dyn QueueSubstrate>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn NotificationStore>, substrate: Arc<dyn QueueSubstrate>) -> Self {
        Self { store, substrate }
    }

    pub async fn submit_signup(
        &self,
        context: &Context,
        event_id: Uuid,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> HashMap<Channel, ChannelOutcome> {
        let mut out = HashMap::new();
        for channel in EventType::Signup.enabled_channels() {
            let outcome = match channel {
                Channel::Email => {
                    let content = content::welcome_email(username, email);
                    self.enqueue_email(context, event_id, EventType::Signup, user_id, email, username, content)
                        .await
                }
                _ => continue,
            };
            out.insert(*channel, outcome);
        }
        out
    }

    pub async fn submit_login(
        &self,
        context: &Context,
        event_id: Uuid,
        user_id: &str,
        email: &str,
        username: &str,
        ip: Option<&str>,
    ) -> HashMap<Channel, ChannelOutcome> {
        let mut out = HashMap::new();
        for channel in EventType::Login.enabled_channels() {
            let outcome = match channel {
                Channel::Email => {
                    let content = content::login_alert_email(username, ip);
                    self.enqueue_email(context, event_id, EventType::Login, user_id, email, username, content)
                        .await
                }
                Channel::InApp => {
                    let content = content::login_in_app(ip);
                    self.enqueue_in_app(context, event_id, EventType::Login, user_id, Priority::Normal, content)
                        .await
                }
                _ => continue,
            };
            out.insert(*channel, outcome);
        }
        out
    }

    pub async fn submit_reset_password(
        &self,
        context: &Context,
        event_id: Uuid,
        user_id: &str,
        email: &str,
        username: &str,
        reset_token: &str,
    ) -> HashMap<Channel, ChannelOutcome> {
        let mut out = HashMap::new();
        for channel in EventType::ResetPassword.enabled_channels() {
            if let Channel::Email = channel {
                let content = content::reset_password_email(username, reset_token);
                let outcome = self
                    .enqueue_email(context, event_id, EventType::ResetPassword, user_id, email, username, content)
                    .await;
                out.insert(*channel, outcome);
            }
        }
        out
    }

    pub async fn submit_purchase(
        &self,
        context: &Context,
        event_id: Uuid,
        user_id: &str,
        order_id: &str,
        total_amount: f64,
        currency: &str,
    ) -> HashMap<Channel, ChannelOutcome> {
        let mut out = HashMap::new();
        for channel in EventType::Purchase.enabled_channels() {
            if let Channel::Push = channel {
                let content = content::purchase_push(order_id, total_amount, currency);
                let source = PushSource {
                    kind: "purchase".to_string(),
                    reference_id: order_id.to_string(),
                    reference_model: "Purchase".to_string(),
                    trigger_details: None,
                };
                let outcome = self
                    .enqueue_push(context, event_id, EventType::Purchase, user_id, Priority::High, content, source)
                    .await;
                out.insert(*channel, outcome);
            }
        }
        out
    }

    pub async fn submit_friend_request(
        &self,
        context: &Context,
        event_id: Uuid,
        from_user_id: &str,
        to_user_id: &str,
    ) -> HashMap<Channel, ChannelOutcome> {
        let mut out = HashMap::new();
        for channel in EventType::FriendRequest.enabled_channels() {
            if let Channel::InApp = channel {
                let content = content::friend_request_in_app(from_user_id);
                let outcome = self
                    .enqueue_in_app(context, event_id, EventType::FriendRequest, to_user_id, Priority::Normal, content)
                    .await;
                out.insert(*channel, outcome);
            }
        }
        out
    }

    async fn enqueue_email(
        &self,
        context: &Context,
        event_id: Uuid,
        event_type: EventType,
        user_id: &str,
        email: &str,
        username: &str,
        content: EmailContent,
    ) -> ChannelOutcome {
        let topology = QueueTopology::new(ChannelFamily::Email);
        let job_id = format!("{}:{}", event_id, Channel::Email.as_str());
        let queue_name = topology.queue_name(Tier::Primary);
        let max_attempts = topology.max_total_attempts();

        let notification = EmailNotification::new(
            event_type,
            EmailRecipient {
                email: email.to_string(),
                user_id: user_id.to_string(),
                username: username.to_string(),
            },
            content.subject,
            EmailBody { html: content.html, text: content.text },
            queue_name.clone(),
            job_id.clone(),
            max_attempts,
        );

        if let Err(e) = self.store.create_email(notification.clone()).await {
            tracing::warn!(error = %e, event_id = %event_id, "failed to persist email tracking record");
            return ChannelOutcome::PersistFailed { reason: e.to_string() };
        }

        let payload = serde_json::json!({
            "tracking_id": notification.id,
            "channel": "email",
            "trace_id": context.trace_id,
        });
        let job = JobEnvelope::new(job_id, notification.id, payload);

        match self.substrate.enqueue(&queue_name, job, EnqueueOptions::default()).await {
            Ok(()) => {
                let mut pending = MirrorSummary::pending();
                pending.queue_job_id = Some(notification.job_id.clone());
                pending.notification_id = Some(notification.id);
                if let Err(e) = self.store.upsert_mirror("email_notification", &notification.id.to_string(), &pending).await {
                    tracing::warn!(error = %e, tracking_id = %notification.id, "failed to write pending email mirror summary");
                }
                ChannelOutcome::Enqueued { tracking_id: notification.id }
            }
            Err(e) => {
                let _ = self
                    .store
                    .upsert_mirror("email_notification", &notification.id.to_string(), &MirrorSummary::queue_failed(e.to_string()))
                    .await;
                ChannelOutcome::QueueFailed { tracking_id: notification.id, reason: e.to_string() }
            }
        }
    }

    async fn enqueue_in_app(
        &self,
        context: &Context,
        event_id: Uuid,
        event_type: EventType,
        recipient_user_id: &str,
        priority: Priority,
        content: InAppContent,
    ) -> ChannelOutcome {
        let topology = QueueTopology::new(ChannelFamily::InApp);
        let job_id = format!("{}:{}", event_id, Channel::InApp.as_str());
        let queue_name = topology.queue_name(Tier::Primary);
        let max_attempts = topology.max_total_attempts();

        let notification = InAppNotification::new(
            event_type,
            recipient_user_id.to_string(),
            content.title,
            content.message,
            content.data,
            priority,
            queue_name.clone(),
            max_attempts,
        );

        if let Err(e) = self.store.create_in_app(notification.clone()).await {
            tracing::warn!(error = %e, event_id = %event_id, "failed to persist in-app tracking record");
            return ChannelOutcome::PersistFailed { reason: e.to_string() };
        }

        let payload = serde_json::json!({
            "tracking_id": notification.id,
            "channel": "in_app",
            "trace_id": context.trace_id,
        });
        let job = JobEnvelope::new(job_id, notification.id, payload);

        match self.substrate.enqueue(&queue_name, job, EnqueueOptions::default()).await {
            Ok(()) => {
                let mut pending = MirrorSummary::pending();
                pending.queue_job_id = Some(notification.current_queue_name.clone());
                pending.notification_id = Some(notification.id);
                if let Err(e) = self.store.upsert_mirror("in_app_notification", &notification.id.to_string(), &pending).await {
                    tracing::warn!(error = %e, tracking_id = %notification.id, "failed to write pending in-app mirror summary");
                }
                ChannelOutcome::Enqueued { tracking_id: notification.id }
            }
            Err(e) => {
                let _ = self
                    .store
                    .upsert_mirror("in_app_notification", &notification.id.to_string(), &MirrorSummary::queue_failed(e.to_string()))
                    .await;
                ChannelOutcome::QueueFailed { tracking_id: notification.id, reason: e.to_string() }
            }
        }
    }

    async fn enqueue_push(
        &self,
        context: &Context,
        event_id: Uuid,
        event_type: EventType,
        recipient_user_id: &str,
        priority: Priority,
        content: PushContent,
        source: PushSource,
    ) -> ChannelOutcome {
        let topology = QueueTopology::new(ChannelFamily::Push);
        let job_id = format!("{}:{}", event_id, Channel::Push.as_str());
        let queue_name = topology.queue_name(Tier::Primary);
        let max_attempts = topology.max_total_attempts();

        let notification = PushNotification::new(
            event_type,
            recipient_user_id.to_string(),
            content.title,
            content.body,
            content.data,
            priority,
            source,
            queue_name.clone(),
            max_attempts,
        );

        if let Err(e) = self.store.create_push(notification.clone()).await {
            tracing::warn!(error = %e, event_id = %event_id, "failed to persist push tracking record");
            return ChannelOutcome::PersistFailed { reason: e.to_string() };
        }

        let payload = serde_json::json!({
            "tracking_id": notification.id,
            "channel": "push",
            "trace_id": context.trace_id,
        });
        let job = JobEnvelope::new(job_id, notification.id, payload);

        match self.substrate.enqueue(&queue_name, job, EnqueueOptions::default()).await {
            Ok(()) => {
                let mut pending = MirrorSummary::pending();
                pending.queue_job_id = Some(notification.current_queue_name.clone());
                pending.notification_id = Some(notification.id);
                if let Err(e) = self.store.upsert_mirror("push_notification", &notification.id.to_string(), &pending).await {
                    tracing::warn!(error = %e, tracking_id = %notification.id, "failed to write pending push mirror summary");
                }
                ChannelOutcome::Enqueued { tracking_id: notification.id }
            }
            Err(e) => {
                let _ = self
                    .store
                    .upsert_mirror("push_notification", &notification.id.to_string(), &MirrorSummary::queue_failed(e.to_string()))
                    .await;
                ChannelOutcome::QueueFailed { tracking_id: notification.id, reason: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueueSubstrate;
    use crate::store::InMemoryStore;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryQueueSubstrate::new(true)),
        )
    }

    #[tokio::test]
    async fn signup_enqueues_exactly_the_email_channel() {
        let orch = orchestrator();
        let ctx = Context::new("instance-1", "12345", "signup", "/signups");
        let outcomes = orch
            .submit_signup(&ctx, Uuid::new_v4(), "12345", "alice", "a@x.com")
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes.get(&Channel::Email), Some(ChannelOutcome::Enqueued { .. })));
    }

    #[tokio::test]
    async fn login_enqueues_email_and_in_app() {
        let orch = orchestrator();
        let ctx = Context::new("instance-1", "7", "login", "/logins");
        let outcomes = orch
            .submit_login(&ctx, Uuid::new_v4(), "7", "a@x.com", "alice", Some("1.2.3.4"))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes.get(&Channel::Email), Some(ChannelOutcome::Enqueued { .. })));
        assert!(matches!(outcomes.get(&Channel::InApp), Some(ChannelOutcome::Enqueued { .. })));
    }

    #[tokio::test]
    async fn successful_enqueue_links_a_pending_mirror() {
        let store = Arc::new(InMemoryStore::new());
        let orch = Orchestrator::new(store.clone(), Arc::new(InMemoryQueueSubstrate::new(true)));
        let ctx = Context::new("instance-1", "12345", "signup", "/signups");
        let outcomes = orch
            .submit_signup(&ctx, Uuid::new_v4(), "12345", "alice", "a@x.com")
            .await;

        let ChannelOutcome::Enqueued { tracking_id } = outcomes.get(&Channel::Email).unwrap() else {
            panic!("expected email channel to enqueue");
        };
        let mirror = store
            .get_mirror("email_notification", &tracking_id.to_string())
            .await
            .unwrap()
            .expect("mirror should be linked immediately after a successful submit");
        assert_eq!(mirror.status, "pending");
    }

    #[tokio::test]
    async fn purchase_enqueues_only_push() {
        let orch = orchestrator();
        let ctx = Context::new("instance-1", "ORD-1", "purchase", "/purchases");
        let outcomes = orch
            .submit_purchase(&ctx, Uuid::new_v4(), "7", "ORD-1", 59.98, "USD")
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes.get(&Channel::Push), Some(ChannelOutcome::Enqueued { .. })));
    }
}
