//! Cluster status and per-user session location endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct ClusterStatusResponse {
    enabled: bool,
    instance_id: String,
    local_connections: usize,
}

pub async fn cluster_status(State(state): State<AppState>) -> Json<ClusterStatusResponse> {
    Json(ClusterStatusResponse {
        enabled: state.session_store.is_enabled(),
        instance_id: state.settings.server.instance_id.clone(),
        local_connections: state.connection_manager.stats().total_connections,
    })
}

#[derive(Serialize)]
pub struct UserLocationResponse {
    user_id: String,
    local: bool,
    remote_instance_id: Option<String>,
}

pub async fn cluster_user_location(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<UserLocationResponse> {
    if state.router.is_user_local(&user_id) {
        return Json(UserLocationResponse {
            user_id,
            local: true,
            remote_instance_id: None,
        });
    }

    let remote_instance_id = state
        .session_store
        .find_user_servers(&user_id)
        .await
        .ok()
        .and_then(|servers| servers.into_iter().next());

    Json(UserLocationResponse {
        user_id,
        local: false,
        remote_instance_id,
    })
}
