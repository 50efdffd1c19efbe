//! Bounded in-memory ring buffer of recent pipeline-stage records, feeding
//! the `/live-view/*` routes. Telemetry never gates correctness — a full
//! buffer just drops its oldest entry.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub trace_id: Uuid,
    pub component: String,
    pub stage: String,
    pub status: String,
    pub started: DateTime<Utc>,
    pub duration_ms: u128,
    pub metadata: Value,
}

pub struct StageLog {
    capacity: usize,
    records: Mutex<VecDeque<StageRecord>>,
}

impl StageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        trace_id: Uuid,
        component: impl Into<String>,
        stage: impl Into<String>,
        status: impl Into<String>,
        started: DateTime<Utc>,
        duration: Duration,
        metadata: Value,
    ) {
        let mut records = self.records.lock().unwrap();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(StageRecord {
            trace_id,
            component: component.into(),
            stage: stage.into(),
            status: status.into(),
            started,
            duration_ms: duration.as_millis(),
            metadata,
        });
    }

    pub fn recent(&self, limit: usize) -> Vec<StageRecord> {
        let records = self.records.lock().unwrap();
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StageLog {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_once_at_capacity() {
        let log = StageLog::new(2);
        for i in 0..3 {
            log.record(
                Uuid::new_v4(),
                "orchestrator",
                "enqueue",
                "ok",
                Utc::now(),
                Duration::from_millis(i),
                Value::Null,
            );
        }
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn recent_returns_newest_first() {
        let log = StageLog::new(10);
        log.record(Uuid::new_v4(), "a", "s", "ok", Utc::now(), Duration::from_millis(1), Value::Null);
        log.record(Uuid::new_v4(), "b", "s", "ok", Utc::now(), Duration::from_millis(1), Value::Null);
        let recent = log.recent(10);
        assert_eq!(recent[0].component, "b");
        assert_eq!(recent[1].component, "a");
    }
}
