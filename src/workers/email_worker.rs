//! Email channel worker: SMTP delivery against `email_notifications`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::delivery::SmtpClient;
use crate::domain::mirror::MirrorSummary;
use crate::domain::tracking::{EmailStatus, RetryHistoryEntry};
use crate::queue::{ChannelFamily, EnqueueOptions, JobEnvelope, QueueSubstrate, QueueTopology, Tier};
use crate::store::NotificationStore;

use super::{mirror_entity_type, run_poll_loop, should_escalate};

pub struct EmailWorker {
    store: Arc<dyn NotificationStore>,
    substrate: Arc<dyn QueueSubstrate>,
    smtp: Arc<SmtpClient>,
    topology: QueueTopology,
    poll_interval: Duration,
    batch_size: usize,
}

impl EmailWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        substrate: Arc<dyn QueueSubstrate>,
        smtp: Arc<SmtpClient>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            substrate,
            smtp,
            topology: QueueTopology::new(ChannelFamily::Email),
            poll_interval,
            batch_size,
        }
    }

    pub async fn run(&self, shutdown: broadcast::Receiver<()>) {
        let topology = self.topology.clone();
        run_poll_loop(
            "email_worker",
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
        let mut record = match self.store.get_email(job.tracking_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::warn!(tracking_id = %job.tracking_id, "email tracking record missing, dropping job");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to load email tracking record");
                return;
            }
        };

        if record.is_terminal() {
            return;
        }

        let now = Utc::now();
        record.status = EmailStatus::Processing;
        record.attempts += 1;
        record.last_attempt_at = Some(now);
        let attempt_in_tier = job.attempt + 1;

        match self.smtp.send(&record.recipient.email, &record.subject, &record.body.html, &record.body.text).await {
            Ok(_message_id) => {
                record.status = EmailStatus::Delivered;
                record.delivered_at = Some(now);
                record.retry_history.push(RetryHistoryEntry {
                    attempt: record.attempts,
                    timestamp: now,
                    queue: record.current_queue_name.clone(),
                    error: None,
                });
                if let Err(e) = self.store.update_email(&record).await {
                    tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist delivered email");
                }
                self.update_mirror(&record).await;
            }
            Err(e) => {
                let reason = e.to_string();
                record.retry_history.push(RetryHistoryEntry {
                    attempt: record.attempts,
                    timestamp: now,
                    queue: record.current_queue_name.clone(),
                    error: Some(reason.clone()),
                });

                if should_escalate(&self.topology, tier, attempt_in_tier) {
                    match tier.next() {
                        Some(next_tier) => {
                            let next_queue = self.topology.queue_name(next_tier);
                            record.current_queue_name = next_queue.clone();
                            record.status = EmailStatus::Pending;
                            let mut next_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
                            next_job.attempt = 0;
                            let delay = self.topology.policy(next_tier).delay;
                            if let Err(e) = self
                                .substrate
                                .enqueue(&next_queue, next_job, EnqueueOptions { delay: Some(delay) })
                                .await
                            {
                                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to escalate email job");
                            }
                            if next_tier == Tier::DeadLetter {
                                record.status = EmailStatus::Failed;
                                record.failed_at = Some(now);
                                record.failure_reason = Some(reason);
                            }
                        }
                        None => {
                            record.status = EmailStatus::Failed;
                            record.failed_at = Some(now);
                            record.failure_reason = Some(reason);
                        }
                    }
                } else {
                    record.status = EmailStatus::Pending;
                    let mut retry_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
                    retry_job.attempt = attempt_in_tier;
                    let delay = self.topology.policy(tier).delay;
                    let queue_name = self.topology.queue_name(tier);
                    if let Err(e) = self
                        .substrate
                        .enqueue(&queue_name, retry_job, EnqueueOptions { delay: Some(delay) })
                        .await
                    {
                        tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to re-enqueue email job");
                    }
                }

                if let Err(e) = self.store.update_email(&record).await {
                    tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist email retry state");
                }
                self.update_mirror(&record).await;
            }
        }
    }

    async fn update_mirror(&self, record: &crate::domain::EmailNotification) {
        let summary = MirrorSummary {
            status: format!("{:?}", record.status).to_lowercase(),
            attempts: record.attempts,
            last_attempt_at: record.last_attempt_at,
            delivered_at: record.delivered_at,
            failed_at: record.failed_at,
            failure_reason: record.failure_reason.clone(),
            queue_job_id: Some(record.job_id.clone()),
            notification_id: Some(record.id),
            delivery_history: Vec::new(),
        };
        if let Err(e) = self
            .store
            .upsert_mirror(mirror_entity_type(ChannelFamily::Email), &record.id.to_string(), &summary)
            .await
        {
            tracing::warn!(error = %e, tracking_id = %record.id, "failed to update email mirror summary");
        }
    }
}
