//! In-app channel worker: socket fan-out (local or cross-instance) against
//! `in_app_notifications`. Expiration is terminal and never escalates;
//! zero reachable connections is a regular failure that follows the usual
//! retry/escalation ladder.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::cluster::ClusterRouter;
use crate::domain::mirror::MirrorSummary;
use crate::domain::tracking::{DeliveryHistoryEntry, EscalationHistoryEntry, InAppStatus};
use crate::queue::{ChannelFamily, EnqueueOptions, JobEnvelope, QueueSubstrate, QueueTopology, Tier};
use crate::socket::{PushEnvelope, ServerMessage};
use crate::store::NotificationStore;

use super::{mirror_entity_type, run_poll_loop, should_escalate};

const DEFAULT_TENANT: &str = "default";

pub struct InAppWorker {
    store: Arc<dyn NotificationStore>,
    substrate: Arc<dyn QueueSubstrate>,
    router: Arc<ClusterRouter>,
    topology: QueueTopology,
    poll_interval: Duration,
    batch_size: usize,
}

impl InAppWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        substrate: Arc<dyn QueueSubstrate>,
        router: Arc<ClusterRouter>,
        poll_interval: Duration,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            substrate,
            router,
            topology: QueueTopology::new(ChannelFamily::InApp),
            poll_interval,
            batch_size,
        }
    }

    pub async fn run(&self, shutdown: tokio::sync::broadcast::Receiver<()>) {
        let topology = self.topology.clone();
        run_poll_loop(
            "in_app_worker",
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
        let mut record = match self.store.get_in_app(job.tracking_id).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::warn!(tracking_id = %job.tracking_id, "in-app tracking record missing, dropping job");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to load in-app tracking record");
                return;
            }
        };

        if matches!(record.status, InAppStatus::Delivered | InAppStatus::Failed | InAppStatus::Expired) {
            return;
        }

        let now = Utc::now();
        if record.is_expired(now) {
            record.status = InAppStatus::Expired;
            if let Err(e) = self.store.update_in_app(&record).await {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist expired in-app record");
            }
            return;
        }

        record.attempts += 1;
        let attempt_in_tier = job.attempt + 1;

        let envelope = PushEnvelope {
            id: record.id,
            event_type: record.event_type.as_str().to_string(),
            title: record.title.clone(),
            message: record.message.clone(),
            data: record.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            timestamp: now,
            priority: record.priority,
        };

        let route = self
            .router
            .route_to_user(&record.recipient_user_id, DEFAULT_TENANT, ServerMessage::Notification(envelope))
            .await
            .unwrap_or(crate::cluster::RouteResult { local_delivered: false, routed_to_servers: 0 });
        let delivered = route.local_delivered || route.routed_to_servers > 0;

        if delivered {
            let socket_id = format!("cluster:{}", record.recipient_user_id);
            record.mark_delivered(socket_id.clone(), now);
            record.delivery_history.push(DeliveryHistoryEntry {
                attempt: record.attempts,
                timestamp: now,
                status: "delivered".to_string(),
                socket_id: Some(socket_id),
                delivery_method: if route.local_delivered { "local".to_string() } else { "routed".to_string() },
                queue: record.current_queue_name.clone(),
            });
            if let Err(e) = self.store.update_in_app(&record).await {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist delivered in-app record");
            }
            self.update_mirror(&record, "delivered", None).await;
            return;
        }

        record.delivery_history.push(DeliveryHistoryEntry {
            attempt: record.attempts,
            timestamp: now,
            status: "failed".to_string(),
            socket_id: None,
            delivery_method: "none".to_string(),
            queue: record.current_queue_name.clone(),
        });

        if should_escalate(&self.topology, tier, attempt_in_tier) {
            match tier.next() {
                Some(next_tier) => {
                    let next_queue = self.topology.queue_name(next_tier);
                    record.escalation_history.push(EscalationHistoryEntry {
                        from_queue: record.current_queue_name.clone(),
                        to_queue: next_queue.clone(),
                        timestamp: now,
                        reason: "no reachable connection".to_string(),
                        attempts: record.attempts,
                    });
                    record.current_queue_name = next_queue.clone();

                    if next_tier == Tier::DeadLetter {
                        record.status = InAppStatus::Failed;
                    } else {
                        record.status = InAppStatus::Queued;
                        let mut next_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
                        next_job.attempt = 0;
                        let delay = self.topology.policy(next_tier).delay;
                        if let Err(e) = self
                            .substrate
                            .enqueue(&next_queue, next_job, EnqueueOptions { delay: Some(delay) })
                            .await
                        {
                            tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to escalate in-app job");
                        }
                    }
                }
                None => {
                    record.status = InAppStatus::Failed;
                }
            }
        } else {
            record.status = InAppStatus::Queued;
            let mut retry_job = JobEnvelope::new(job.job_id.clone(), job.tracking_id, job.payload.clone());
            retry_job.attempt = attempt_in_tier;
            let delay = self.topology.policy(tier).delay;
            let queue_name = self.topology.queue_name(tier);
            if let Err(e) = self
                .substrate
                .enqueue(&queue_name, retry_job, EnqueueOptions { delay: Some(delay) })
                .await
            {
                tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to re-enqueue in-app job");
            }
        }

        if let Err(e) = self.store.update_in_app(&record).await {
            tracing::error!(error = %e, tracking_id = %job.tracking_id, "failed to persist in-app retry state");
        }

        let reason = matches!(record.status, InAppStatus::Failed)
            .then(|| "max retries exceeded".to_string());
        let status = if record.status == InAppStatus::Failed { "failed" } else { "queued" };
        self.update_mirror(&record, status, reason).await;
    }

    async fn update_mirror(
        &self,
        record: &crate::domain::InAppNotification,
        status: &str,
        failure_reason: Option<String>,
    ) {
        let now = Utc::now();
        let summary = MirrorSummary {
            status: status.to_string(),
            attempts: record.attempts,
            last_attempt_at: Some(now),
            delivered_at: if status == "delivered" { Some(now) } else { None },
            failed_at: if status == "failed" { Some(now) } else { None },
            failure_reason,
            queue_job_id: Some(record.current_queue_name.clone()),
            notification_id: Some(record.id),
            delivery_history: record.delivery_history.clone(),
        };
        if let Err(e) = self
            .store
            .upsert_mirror(mirror_entity_type(ChannelFamily::InApp), &record.id.to_string(), &summary)
            .await
        {
            tracing::warn!(error = %e, tracking_id = %record.id, "failed to update in-app mirror summary");
        }
    }
}
