//! In-process `QueueSubstrate`, used for local/testing topology with no
//! external Redis dependency.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::substrate::{
    EnqueueOptions, JobEnvelope, QueueSubstrate, QueueSubstrateError, SubstrateQueueStats,
    VISIBILITY_TIMEOUT,
};

struct Delayed {
    job: JobEnvelope,
    visible_at: Instant,
}

struct Claimed {
    job: JobEnvelope,
    claimed_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<JobEnvelope>,
    delayed: Vec<Delayed>,
    claimed: Vec<Claimed>,
    paused: bool,
}

pub struct InMemoryQueueSubstrate {
    enabled: bool,
    queues: DashMap<String, QueueState>,
}

impl InMemoryQueueSubstrate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            queues: DashMap::new(),
        }
    }

    fn promote_due(&self, queue: &str) {
        if let Some(mut state) = self.queues.get_mut(queue) {
            let now = Instant::now();
            let due: Vec<_> = state
                .delayed
                .iter()
                .enumerate()
                .filter(|(_, d)| d.visible_at <= now)
                .map(|(i, _)| i)
                .collect();
            for i in due.into_iter().rev() {
                let d = state.delayed.remove(i);
                state.ready.push_back(d.job);
            }
        }
    }

    /// Returns unacked claims older than [`VISIBILITY_TIMEOUT`] to `ready`,
    /// on the assumption the worker that claimed them crashed.
    fn reclaim_stale(&self, queue: &str) {
        if let Some(mut state) = self.queues.get_mut(queue) {
            let now = Instant::now();
            let stale: Vec<_> = state
                .claimed
                .iter()
                .enumerate()
                .filter(|(_, c)| now.duration_since(c.claimed_at) >= VISIBILITY_TIMEOUT)
                .map(|(i, _)| i)
                .collect();
            for i in stale.into_iter().rev() {
                let c = state.claimed.remove(i);
                state.ready.push_back(c.job);
            }
        }
    }
}

#[async_trait]
impl QueueSubstrate for InMemoryQueueSubstrate {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn enqueue(
        &self,
        queue: &str,
        job: JobEnvelope,
        opts: EnqueueOptions,
    ) -> Result<(), QueueSubstrateError> {
        if !self.enabled {
            return Err(QueueSubstrateError::Disabled);
        }
        let mut state = self.queues.entry(queue.to_string()).or_default();
        match opts.delay {
            Some(delay) if delay > Duration::ZERO => state.delayed.push(Delayed {
                job,
                visible_at: Instant::now() + delay,
            }),
            _ => state.ready.push_back(job),
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        max: usize,
    ) -> Result<Vec<JobEnvelope>, QueueSubstrateError> {
        if !self.enabled {
            return Err(QueueSubstrateError::Disabled);
        }
        self.promote_due(queue);
        self.reclaim_stale(queue);
        let Some(mut state) = self.queues.get_mut(queue) else {
            return Ok(Vec::new());
        };
        if state.paused {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(max.min(state.ready.len()));
        for _ in 0..max {
            match state.ready.pop_front() {
                Some(job) => out.push(job),
                None => break,
            }
        }
        let claimed_at = Instant::now();
        state.claimed.extend(out.iter().cloned().map(|job| Claimed { job, claimed_at }));
        Ok(out)
    }

    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), QueueSubstrateError> {
        if let Some(mut state) = self.queues.get_mut(queue) {
            if let Some(i) = state.claimed.iter().position(|c| c.job.job_id == job_id) {
                state.claimed.remove(i);
            }
        }
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize, QueueSubstrateError> {
        self.promote_due(queue);
        Ok(self
            .queues
            .get(queue)
            .map(|s| s.ready.len() + s.delayed.len() + s.claimed.len())
            .unwrap_or(0))
    }

    async fn stats(&self, queue: &str) -> Result<SubstrateQueueStats, QueueSubstrateError> {
        Ok(SubstrateQueueStats {
            queue: queue.to_string(),
            depth: self.depth(queue).await?,
            enabled: self.enabled,
        })
    }

    async fn clear(&self, queue: &str) -> Result<usize, QueueSubstrateError> {
        let Some((_, state)) = self.queues.remove(queue) else {
            return Ok(0);
        };
        Ok(state.ready.len() + state.delayed.len() + state.claimed.len())
    }

    async fn pause(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        self.queues.entry(queue.to_string()).or_default().paused = true;
        Ok(())
    }

    async fn resume(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        self.queues.entry(queue.to_string()).or_default().paused = false;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> Result<bool, QueueSubstrateError> {
        Ok(self.queues.get(queue).map(|s| s.paused).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job() -> JobEnvelope {
        JobEnvelope::new("job-1".into(), Uuid::new_v4(), serde_json::json!({}))
    }

    #[tokio::test]
    async fn disabled_substrate_rejects_enqueue() {
        let sub = InMemoryQueueSubstrate::new(false);
        let err = sub
            .enqueue("email:primary", job(), EnqueueOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueSubstrateError::Disabled));
    }

    #[tokio::test]
    async fn enqueue_then_consume_fifo() {
        let sub = InMemoryQueueSubstrate::new(true);
        sub.enqueue("email:primary", job(), EnqueueOptions::default())
            .await
            .unwrap();
        let drained = sub.consume("email:primary", 10).await.unwrap();
        assert_eq!(drained.len(), 1);
        // Claimed, not yet acked: still counts against depth.
        assert_eq!(sub.depth("email:primary").await.unwrap(), 1);
        sub.ack("email:primary", &drained[0].job_id).await.unwrap();
        assert_eq!(sub.depth("email:primary").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unacked_job_is_not_redelivered_before_visibility_timeout() {
        let sub = InMemoryQueueSubstrate::new(true);
        sub.enqueue("email:primary", job(), EnqueueOptions::default())
            .await
            .unwrap();
        let first = sub.consume("email:primary", 10).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = sub.consume("email:primary", 10).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn delayed_job_not_visible_until_delay_elapses() {
        let sub = InMemoryQueueSubstrate::new(true);
        sub.enqueue(
            "email:retry",
            job(),
            EnqueueOptions {
                delay: Some(Duration::from_millis(50)),
            },
        )
        .await
        .unwrap();
        assert!(sub.consume("email:retry", 10).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(sub.consume("email:retry", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pause_suppresses_consume_without_dropping_jobs() {
        let sub = InMemoryQueueSubstrate::new(true);
        sub.enqueue("push:primary", job(), EnqueueOptions::default())
            .await
            .unwrap();
        sub.pause("push:primary").await.unwrap();
        assert!(sub.consume("push:primary", 10).await.unwrap().is_empty());
        sub.resume("push:primary").await.unwrap();
        assert_eq!(sub.consume("push:primary", 10).await.unwrap().len(), 1);
    }
}
