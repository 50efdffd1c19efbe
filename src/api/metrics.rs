//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode};

use crate::metrics::{encode_metrics, CONNECTIONS_TOTAL, REDIS_CIRCUIT_BREAKER_STATE, REDIS_CONNECTION_STATUS};
use crate::redis::CircuitState;
use crate::server::AppState;

fn sync_gauges_from_state(state: &AppState) {
    CONNECTIONS_TOTAL.set(state.connection_manager.stats().total_connections as i64);
    REDIS_CONNECTION_STATUS.set(if state.redis_health.is_healthy() { 1 } else { 0 });
    let circuit_value = match state.redis_circuit_breaker.state() {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    };
    REDIS_CIRCUIT_BREAKER_STATE.set(circuit_value);
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    sync_gauges_from_state(&state);
    encode_metrics().map_err(|e| {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
