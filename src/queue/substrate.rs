//! `QueueSubstrate`: the trait every tier's backing store implements.
//!
//! Shaped directly on the donor's `MessageQueueBackend` trait (richer of
//! its two queue abstractions): async, per-key scoped, returns structured
//! stats rather than raw counts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// How long a consumed-but-unacked job stays claimed before a substrate is
/// allowed to make it visible again. Generous relative to worker poll
/// intervals and SMTP/FCM round-trip time, so a job is only reclaimed once a
/// worker has plausibly crashed rather than merely being slow.
pub const VISIBILITY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum QueueSubstrateError {
    #[error("queue substrate disabled")]
    Disabled,
    #[error("queue '{queue}' is full ({size} items)")]
    Full { queue: String, size: usize },
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("substrate unavailable: {0}")]
    Unavailable(String),
}

/// An enqueued unit of work. `job_id` is deterministic
/// (`{event_id}:{channel}`) so re-enqueue after a crash is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: String,
    pub tracking_id: Uuid,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub attempt: u32,
}

impl JobEnvelope {
    pub fn new(job_id: String, tracking_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            job_id,
            tracking_id,
            payload,
            enqueued_at: Utc::now(),
            attempt: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// When set, the job is not visible to `consume` until this delay elapses.
    pub delay: Option<std::time::Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubstrateQueueStats {
    pub queue: String,
    pub depth: usize,
    pub enabled: bool,
}

#[async_trait]
pub trait QueueSubstrate: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Enqueue a job onto `queue`, respecting `opts.delay` if the substrate
    /// supports delayed visibility.
    async fn enqueue(
        &self,
        queue: &str,
        job: JobEnvelope,
        opts: EnqueueOptions,
    ) -> Result<(), QueueSubstrateError>;

    /// Claim up to `max` due jobs from `queue` (delayed jobs whose delay has
    /// not elapsed are not returned). A claimed job is moved out of the
    /// ready set but is NOT discarded: it stays claimed until [`Self::ack`]
    /// is called for it, and a substrate MUST make it visible again on its
    /// own if it goes unacked for longer than [`VISIBILITY_TIMEOUT`]. This
    /// is what gives at-least-once delivery across a worker crash between
    /// `consume` and the post-processing step that would otherwise ack it.
    async fn consume(&self, queue: &str, max: usize) -> Result<Vec<JobEnvelope>, QueueSubstrateError>;

    /// Acknowledge that `job_id` (claimed via a prior `consume` on `queue`)
    /// has been fully handled — delivered, or durably re-enqueued onto
    /// another tier/queue by the caller. Removes it from the claimed set so
    /// it is never redelivered. Acking an unknown or already-acked job is a
    /// no-op, not an error.
    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), QueueSubstrateError>;

    async fn depth(&self, queue: &str) -> Result<usize, QueueSubstrateError>;

    async fn stats(&self, queue: &str) -> Result<SubstrateQueueStats, QueueSubstrateError>;

    /// Remove every job on `queue` (operator action, live-view).
    async fn clear(&self, queue: &str) -> Result<usize, QueueSubstrateError>;

    /// Pause consumption of `queue` without losing queued jobs.
    async fn pause(&self, queue: &str) -> Result<(), QueueSubstrateError>;

    async fn resume(&self, queue: &str) -> Result<(), QueueSubstrateError>;

    async fn is_paused(&self, queue: &str) -> Result<bool, QueueSubstrateError>;
}
