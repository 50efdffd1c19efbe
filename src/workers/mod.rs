//! Channel workers: the consumers on the other end of the queue topology.
//! Each implements the same attempt/escalation shape against its own
//! delivery mechanics (SMTP, socket fan-out, FCM).

mod email_worker;
mod in_app_worker;
mod push_worker;

pub use email_worker::EmailWorker;
pub use in_app_worker::InAppWorker;
pub use push_worker::PushWorker;

use std::time::Duration;

use tokio::sync::broadcast;

use crate::queue::{ChannelFamily, QueueSubstrate, QueueTopology, Tier};

/// Ticks on `poll_interval`, polling every non-terminal tier of `topology`
/// in priority order (freshest tier first) and invoking `process_one` for
/// every job returned, until `shutdown` fires.
pub(crate) async fn run_poll_loop<F, Fut>(
    name: &str,
    substrate: &dyn QueueSubstrate,
    topology: &QueueTopology,
    poll_interval: Duration,
    batch_size: usize,
    mut shutdown: broadcast::Receiver<()>,
    mut process_one: F,
) where
    F: FnMut(Tier, crate::queue::JobEnvelope) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(worker = name, "worker stopping on shutdown");
                return;
            }
            _ = ticker.tick() => {
                for tier in [Tier::Primary, Tier::Retry, Tier::Delayed] {
                    let queue_name = topology.queue_name(tier);
                    match substrate.consume(&queue_name, batch_size).await {
                        Ok(jobs) => {
                            for job in jobs {
                                let job_id = job.job_id.clone();
                                process_one(tier, job).await;
                                // process_one has durably recorded the outcome (delivered, or
                                // re-enqueued onto the next tier) before returning, so it is now
                                // safe to release the claim.
                                if let Err(e) = substrate.ack(&queue_name, &job_id).await {
                                    tracing::warn!(worker = name, queue = %queue_name, job_id = %job_id, error = %e, "failed to ack processed job");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(worker = name, queue = %queue_name, error = %e, "failed to poll queue");
                        }
                    }
                }
            }
        }
    }
}

/// Whether a failed attempt should retry in the current tier or escalate to
/// the next one, given the record's in-tier attempt count after increment.
pub(crate) fn should_escalate(topology: &QueueTopology, tier: Tier, attempts_in_tier: u32) -> bool {
    attempts_in_tier >= topology.policy(tier).max_attempts_in_tier
}

/// The mirror table's `entity_type` discriminator for a channel family,
/// matching the strings the orchestrator already writes on enqueue failure.
pub(crate) fn mirror_entity_type(family: ChannelFamily) -> &'static str {
    match family {
        ChannelFamily::Email => "email_notification",
        ChannelFamily::InApp => "in_app_notification",
        ChannelFamily::Push => "push_notification",
    }
}
