//! `/live-view/*` — operator dashboard surface over live queue depths,
//! connection counts, and recent pipeline-stage traces. Read-only except
//! for `/simulate`, which exercises the orchestrator with a synthetic
//! event so the dashboard has something to show in a fresh environment.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::Context;
use crate::error::Result;
use crate::queue::{ChannelFamily, QueueTopology, Tier};
use crate::server::AppState;
use crate::telemetry::StageRecord;

#[derive(Serialize)]
pub struct LiveStatusResponse {
    uptime_seconds: u64,
    redis_healthy: bool,
    postgres_available: bool,
    connections: usize,
    recent_stage_count: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<LiveStatusResponse> {
    Json(LiveStatusResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        redis_healthy: state.redis_health.is_healthy(),
        postgres_available: state.postgres_pool.is_available(),
        connections: state.connection_manager.stats().total_connections,
        recent_stage_count: state.stage_log.len(),
    })
}

pub async fn requests(State(state): State<AppState>) -> Json<Vec<StageRecord>> {
    Json(state.stage_log.recent(100))
}

#[derive(Serialize)]
pub struct QueueSnapshot {
    queue: String,
    depth: usize,
    enabled: bool,
    paused: bool,
}

pub async fn queues(State(state): State<AppState>) -> Result<Json<Vec<QueueSnapshot>>> {
    let mut snapshots = Vec::new();
    for family in [ChannelFamily::Email, ChannelFamily::InApp, ChannelFamily::Push] {
        let topology = QueueTopology::new(family);
        for tier in Tier::ALL {
            let queue = topology.queue_name(*tier);
            let stats = state.queue_substrate.stats(&queue).await?;
            let paused = state.queue_substrate.is_paused(&queue).await?;
            snapshots.push(QueueSnapshot {
                queue,
                depth: stats.depth,
                enabled: stats.enabled,
                paused,
            });
        }
    }
    Ok(Json(snapshots))
}

#[derive(Serialize)]
pub struct ConnectionsResponse {
    total: usize,
    cluster_enabled: bool,
}

pub async fn connections(State(state): State<AppState>) -> Json<ConnectionsResponse> {
    Json(ConnectionsResponse {
        total: state.connection_manager.stats().total_connections,
        cluster_enabled: state.session_store.is_enabled(),
    })
}

pub async fn simulate(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let start = std::time::Instant::now();
    let started = chrono::Utc::now();
    let event_id = Uuid::new_v4();
    let context = Context::new(
        state.settings.server.instance_id.clone(),
        event_id.to_string(),
        "live_view_simulation",
        "/live-view/simulate",
    );

    let outcomes = state
        .orchestrator
        .submit_signup(&context, event_id, "live-view-sim-user", "simulated", "sim@example.com")
        .await;

    state.stage_log.record(
        context.trace_id,
        "orchestrator",
        "submit_signup",
        "ok",
        started,
        start.elapsed(),
        json!({ "simulated": true, "channels": outcomes.len() }),
    );

    Ok(Json(json!({
        "trace_id": context.trace_id,
        "event_id": event_id,
        "channels": outcomes.len(),
        "duration_ms": start.elapsed().as_millis(),
    })))
}

