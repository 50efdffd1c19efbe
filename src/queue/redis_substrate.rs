//! Redis-backed `QueueSubstrate`.
//!
//! Ready jobs live on a Stream (`XADD`/`XRANGE`/`XDEL`), mirroring the
//! donor's `PostgresQueueBackend` dequeue-by-range-then-delete idiom but
//! against Redis Streams instead of SQL rows. Delayed jobs live on a
//! sorted set keyed by their visibility timestamp; `consume` first
//! promotes any due members into the stream, then drains it.
//!
//! A job is not simply dropped off the stream on consume: it is moved into
//! a `claimed` hash (job_id -> {payload, claimed_at}) and only disappears
//! for good once [`RedisQueueSubstrate::ack`] removes it. `consume` sweeps
//! that hash first and puts anything claimed longer than
//! [`super::substrate::VISIBILITY_TIMEOUT`] back on the stream, so a worker
//! that crashes mid-job does not lose it.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::substrate::{
    EnqueueOptions, JobEnvelope, QueueSubstrate, QueueSubstrateError, SubstrateQueueStats,
    VISIBILITY_TIMEOUT,
};

#[derive(serde::Serialize, serde::Deserialize)]
struct ClaimedEntry {
    job: JobEnvelope,
    claimed_at_ms: i64,
}

pub struct RedisQueueSubstrate {
    conn: ConnectionManager,
    enabled: bool,
    key_prefix: String,
}

impl RedisQueueSubstrate {
    pub fn new(conn: ConnectionManager, enabled: bool, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            enabled,
            key_prefix: key_prefix.into(),
        }
    }

    fn stream_key(&self, queue: &str) -> String {
        format!("{}:stream:{}", self.key_prefix, queue)
    }

    fn delayed_key(&self, queue: &str) -> String {
        format!("{}:delayed:{}", self.key_prefix, queue)
    }

    fn paused_key(&self, queue: &str) -> String {
        format!("{}:paused:{}", self.key_prefix, queue)
    }

    fn claimed_key(&self, queue: &str) -> String {
        format!("{}:claimed:{}", self.key_prefix, queue)
    }

    async fn promote_due(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore(self.delayed_key(queue), 0, now_ms)
            .await?;
        for raw in due {
            let _: i64 = conn
                .xadd(self.stream_key(queue), "*", &[("payload", raw.as_str())])
                .await?;
            let _: i64 = conn.zrem(self.delayed_key(queue), raw).await?;
        }
        Ok(())
    }

    /// Puts claims older than [`VISIBILITY_TIMEOUT`] back on the stream,
    /// on the assumption the worker that claimed them crashed.
    async fn reclaim_stale(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let entries: Vec<(String, String)> = conn.hgetall(self.claimed_key(queue)).await?;
        for (job_id, raw) in entries {
            let Ok(entry) = serde_json::from_str::<ClaimedEntry>(&raw) else {
                continue;
            };
            if now_ms - entry.claimed_at_ms < VISIBILITY_TIMEOUT.as_millis() as i64 {
                continue;
            }
            let payload = serde_json::to_string(&entry.job)?;
            let _: String = conn
                .xadd(self.stream_key(queue), "*", &[("payload", payload.as_str())])
                .await?;
            let _: i64 = conn.hdel(self.claimed_key(queue), job_id).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl QueueSubstrate for RedisQueueSubstrate {
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
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(&job)?;
        match opts.delay.filter(|d| !d.is_zero()) {
            Some(delay) => {
                let visible_at = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;
                let _: i64 = conn
                    .zadd(self.delayed_key(queue), raw, visible_at)
                    .await?;
            }
            None => {
                let _: String = conn
                    .xadd(self.stream_key(queue), "*", &[("payload", raw.as_str())])
                    .await?;
            }
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
        if self.is_paused(queue).await? {
            return Ok(Vec::new());
        }
        self.promote_due(queue).await?;
        self.reclaim_stale(queue).await?;

        let mut conn = self.conn.clone();
        let key = self.stream_key(queue);
        let entries: Vec<(String, Vec<(String, String)>)> =
            redis::cmd("XRANGE")
                .arg(&key)
                .arg("-")
                .arg("+")
                .arg("COUNT")
                .arg(max)
                .query_async(&mut conn)
                .await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut jobs = Vec::with_capacity(entries.len());
        let mut ids = Vec::with_capacity(entries.len());
        for (id, fields) in entries {
            if let Some((_, payload)) = fields.iter().find(|(f, _)| f == "payload") {
                if let Ok(job) = serde_json::from_str::<JobEnvelope>(payload) {
                    let entry = ClaimedEntry {
                        job: job.clone(),
                        claimed_at_ms: now_ms,
                    };
                    let _: () = conn
                        .hset(self.claimed_key(queue), &job.job_id, serde_json::to_string(&entry)?)
                        .await?;
                    jobs.push(job);
                }
            }
            ids.push(id);
        }
        if !ids.is_empty() {
            let _: i64 = conn.xdel(&key, &ids).await?;
        }
        Ok(jobs)
    }

    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hdel(self.claimed_key(queue), job_id).await?;
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize, QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let stream_len: i64 = conn.xlen(self.stream_key(queue)).await.unwrap_or(0);
        let delayed_len: i64 = conn.zcard(self.delayed_key(queue)).await.unwrap_or(0);
        let claimed_len: i64 = conn.hlen(self.claimed_key(queue)).await.unwrap_or(0);
        Ok((stream_len + delayed_len + claimed_len).max(0) as usize)
    }

    async fn stats(&self, queue: &str) -> Result<SubstrateQueueStats, QueueSubstrateError> {
        Ok(SubstrateQueueStats {
            queue: queue.to_string(),
            depth: self.depth(queue).await?,
            enabled: self.enabled,
        })
    }

    async fn clear(&self, queue: &str) -> Result<usize, QueueSubstrateError> {
        let depth = self.depth(queue).await?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.stream_key(queue)).await?;
        let _: i64 = conn.del(self.delayed_key(queue)).await?;
        let _: i64 = conn.del(self.claimed_key(queue)).await?;
        Ok(depth)
    }

    async fn pause(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.paused_key(queue), 1).await?;
        Ok(())
    }

    async fn resume(&self, queue: &str) -> Result<(), QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.paused_key(queue)).await?;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> Result<bool, QueueSubstrateError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.paused_key(queue)).await?;
        Ok(exists)
    }
}
