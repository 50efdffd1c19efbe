//! Push channel worker: FCM delivery against `push_notifications`. Tokens
//! with no resolvable targets are a terminal failure with no retry; partial
//! per-token failures are folded back into the token registry without
//! affecting the record's own retry ladder.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::delivery::{FcmClient, FcmTokenDisposition};
use crate::domain::mirror::MirrorSummary;
use crate::domain::tracking::PushStatus;
use crate::queue::{ChannelFamily, EnqueueOptions, JobEnvelope, QueueSubstrate, QueueTopology, Tier};
use crate::store::NotificationStore;
use crate::token_registry::TokenRegistry;

use super::{mirror_entity_type, run_poll_loop, should_escalate};

pub struct PushWorker {
    store: Arc<dyn NotificationStore>,
    substrate: Arc<dyn QueueSubstrate>,
    tokens: Arc<dyn TokenRegistry>,
    fcm: Arc<FcmClient>,
    topology: QueueTopology,
    poll_interval: Duration,
    batch_size: usize,
}

impl PushWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        substrate: Arc<dyn QueueSubstrate>,
        tokens: Arc<dyn TokenRegistry>,
        fcm: Arc<FcmClient>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            substrate,
            tokens,
            fcm,
            topology: QueueTopology::new(ChannelFamily::Push),
            poll_interval,
            batch_size,
        }
    }

    pub async fn run(&self, shutdown: tokio::sync::broadcast::Receiver<()>) {
        let topology = self.topology.clone();
        run_poll_loop(
            "push_worker",
            self.substrate.as_ref(),
            &topology,
            self.poll_interval,
            self.batch_size,
            shutdown,
            |tier, job| self.process(tier, job),
        )
        .await;
    }

    async fn process(&self, tier: Tier, job: JobEnvelope) {
        let mut record = match self.store.get_push(job.tracking_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::warn!(tracking_id = %job.tracking_id, "push tracking record missing, dropping job");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to load push tracking record");
                return;
            }
        };

        if matches!(record.status, PushStatus::Delivered | PushStatus::Failed | PushStatus::Clicked) {
            return;
        }

        let now = Utc::now();
        if now > record.expires_at {
            record.status = PushStatus::Failed;
            record.timestamps.failed_at = Some(now);
            let _ = self.store.update_push(&record).await;
            return;
        }

        let active_tokens = match self.tokens.resolvable_for_user(&record.recipient_user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to resolve push tokens");
                Vec::new()
            }
        };

        if active_tokens.is_empty() {
            record.status = PushStatus::Failed;
            record.timestamps.failed_at = Some(now);
            record.timestamps.last_attempt_at = Some(now);
            record.delivery_status.failed = true;
            if let Err(e) = self.store.update_push(&record).await {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist push no-token failure");
            }
            self.update_mirror(&record, "failed", Some("no active tokens".to_string())).await;
            return;
        }

        record.status = PushStatus::Processing;
        record.attempts += 1;
        record.timestamps.last_attempt_at = Some(now);
        let attempt_in_tier = job.attempt + 1;

        let token_strings: Vec<String> = active_tokens.iter().map(|t| t.token.clone()).collect();
        let outcome = self
            .fcm
            .send_multicast(&token_strings, &record.title, &record.body, &record.data)
            .await;

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, tracking_id = %job.tracking_id, "fcm send failed entirely");
                for token in &active_tokens {
                    if let Err(e) = self.tokens.record_attempt(token.id, false).await {
                        tracing::warn!(error = %e, token_id = %token.id, "failed to record push attempt on token");
                    }
                }
                self.retry_or_escalate(&mut record, tier, attempt_in_tier, &job, e.to_string()).await;
                return;
            }
        };

        for (i, (token, disposition)) in outcome.dispositions.iter().enumerate() {
            let delivered = !matches!(disposition, FcmTokenDisposition::Failed { .. });
            if let Err(e) = self.tokens.record_attempt(active_tokens[i].id, delivered).await {
                tracing::warn!(error = %e, token = %token, "failed to record push attempt on token");
            }
            if let FcmTokenDisposition::Failed { code } = disposition {
                if let Err(e) = self
                    .tokens
                    .record_provider_error(active_tokens[i].id, code, "fcm delivery failed".to_string())
                    .await
                {
                    tracing::warn!(error = %e, token = %token, "failed to record provider error on token");
                }
            }
        }

        if outcome.all_failed() {
            let reason = "all tokens rejected by provider".to_string();
            self.retry_or_escalate(&mut record, tier, attempt_in_tier, &job, reason).await;
            return;
        }

        record.status = PushStatus::Sent;
        record.delivery_status.sent = true;
        record.timestamps.sent_at = Some(now);
        if let Err(e) = self.store.update_push(&record).await {
            tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist sent push record");
        }
        self.update_mirror(&record, "sent", None).await;
    }

    async fn retry_or_escalate(
        &self,
        record: &mut crate::domain::PushNotification,
        tier: Tier,
        attempt_in_tier: u32,
        job: &JobEnvelope,
        reason: String,
    ) {
        let now = Utc::now();
        if should_escalate(&self.topology, tier, attempt_in_tier) {
            match tier.next() {
                Some(next_tier) => {
                    let next_queue = self.topology.queue_name(next_tier);
                    record.current_queue_name = next_queue.clone();

                    if next_tier == Tier::DeadLetter {
                        record.status = PushStatus::Failed;
                        record.timestamps.failed_at = Some(now);
                        record.delivery_status.failed = true;
                    } else {
                        record.status = PushStatus::Pending;
                        let mut next_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
                        next_job.attempt = 0;
                        let delay = self.topology.policy(next_tier).delay;
                        if let Err(e) = self
                            .substrate
                            .enqueue(&next_queue, next_job, EnqueueOptions { delay: Some(delay) })
                            .await
                        {
                            tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to escalate push job");
                        }
                    }
                }
                None => {
                    record.status = PushStatus::Failed;
                    record.timestamps.failed_at = Some(now);
                    record.delivery_status.failed = true;
                }
            }
        } else {
            record.status = PushStatus::Pending;
            let mut retry_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
            retry_job.attempt = attempt_in_tier;
            let delay = self.topology.policy(tier).delay;
            let queue_name = self.topology.queue_name(tier);
            if let Err(e) = self
                .substrate
                .enqueue(&queue_name, retry_job, EnqueueOptions { delay: Some(delay) })
                .await
            {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to re-enqueue push job");
            }
        }

        let failed = record.status == PushStatus::Failed;
        if let Err(e) = self.store.update_push(record).await {
            tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist push retry state");
        }
        let status = if failed { "failed" } else { "pending" };
        let failure_reason = failed.then_some(reason);
        self.update_mirror(record, status, failure_reason).await;
    }

    async fn update_mirror(
        &self,
        record: &crate::domain::PushNotification,
        status: &str,
        failure_reason: Option<String>,
    ) {
        let summary = MirrorSummary {
            status: status.to_string(),
            attempts: record.attempts,
            last_attempt_at: record.timestamps.last_attempt_at,
            delivered_at: record.timestamps.delivered_at,
            failed_at: record.timestamps.failed_at,
            failure_reason,
            queue_job_id: Some(record.current_queue_name.clone()),
            notification_id: Some(record.id),
            delivery_history: Vec::new(),
        };
        if let Err(e) = self
            .store
            .upsert_mirror(mirror_entity_type(ChannelFamily::Push), &record.id.to_string(), &summary)
            .await
        {
            tracing::warn!(error = %e, tracking_id = %record.id, "failed to update push mirror summary");
        }
    }
}
