//! Liveness/readiness and aggregate stats endpoints. Unauthenticated,
//! unrated — per the route-layering rules these never sit behind
//! `api_key_auth`/`rate_limit_middleware`.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::redis::RedisHealthStatus;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
    redis: RedisHealthResponse,
    postgres: PostgresHealthResponse,
    connections: u64,
}

#[derive(Serialize)]
struct RedisHealthResponse {
    status: &'static str,
    healthy: bool,
}

#[derive(Serialize)]
struct PostgresHealthResponse {
    available: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis_status = state.redis_health.status();
    let overall = if state.postgres_pool.is_available()
        && !matches!(redis_status, RedisHealthStatus::CircuitOpen)
    {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: overall,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        redis: RedisHealthResponse {
            status: redis_status.as_str(),
            healthy: state.redis_health.is_healthy(),
        },
        postgres: PostgresHealthResponse {
            available: state.postgres_pool.is_available(),
        },
        connections: state.connection_manager.stats().total_connections as u64,
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    uptime_seconds: u64,
    connections: ConnectionStatsResponse,
    queue: QueueStatsResponse,
    redis: RedisStatsResponse,
}

#[derive(Serialize)]
struct ConnectionStatsResponse {
    total: usize,
}

#[derive(Serialize)]
struct QueueStatsResponse {
    enabled: bool,
}

#[derive(Serialize)]
struct RedisStatsResponse {
    status: &'static str,
    circuit_state: &'static str,
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections: ConnectionStatsResponse {
            total: state.connection_manager.stats().total_connections,
        },
        queue: QueueStatsResponse {
            enabled: state.queue_substrate.is_enabled(),
        },
        redis: RedisStatsResponse {
            status: state.redis_health.status().as_str(),
            circuit_state: match state.redis_circuit_breaker.state() {
                crate::redis::CircuitState::Closed => "closed",
                crate::redis::CircuitState::Open => "open",
                crate::redis::CircuitState::HalfOpen => "half_open",
            },
        },
    })
}
