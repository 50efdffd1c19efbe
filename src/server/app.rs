use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::socket::ws_handler;

use super::middleware::{api_key_auth, rate_limit_middleware, ws_rate_limit_middleware};
use super::AppState;

/// Maximum request body size for regular endpoints (64 KB)
const MAX_BODY_SIZE: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.settings.server.cors_origins);

    let ws_routes = Router::new()
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(state.clone(), ws_rate_limit_middleware));

    // Unauthenticated, unrated: liveness/readiness probes and metrics scrape.
    let health_routes = Router::new()
        .route("/health", get(crate::api::health))
        .route("/metrics", get(crate::api::prometheus_metrics));

    let event_routes = Router::new()
        .route("/signups", post(crate::api::create_signup))
        .route("/signups/{id}/welcome-email-status", get(crate::api::welcome_email_status))
        .route("/logins", post(crate::api::create_login))
        .route("/logins/{id}/login-alert-status", get(crate::api::login_alert_status))
        .route("/logins/{id}/in-app-status", get(crate::api::login_in_app_status))
        .route("/reset-passwords", post(crate::api::create_reset_password))
        .route("/reset-passwords/{id}/status", get(crate::api::reset_password_status))
        .route("/purchases", post(crate::api::create_purchase))
        .route("/purchases/{id}/push-status", get(crate::api::purchase_push_mirror_status))
        .route("/friend-requests", post(crate::api::create_friend_request))
        .route("/friend-requests/{id}/status", get(crate::api::friend_request_status));

    let token_routes = Router::new()
        .route("/fcm-tokens", post(crate::api::register_token))
        .route("/fcm-tokens/refresh", post(crate::api::refresh_token))
        .route("/fcm-tokens/{token}", delete(crate::api::delete_token))
        .route("/fcm-tokens/user/{user_id}", get(crate::api::tokens_for_user))
        .route("/fcm-tokens/statistics", get(crate::api::token_statistics))
        .route("/fcm-tokens/mark-stale", post(crate::api::mark_stale_sweep))
        .route("/fcm-tokens/cleanup", delete(crate::api::cleanup_expired));

    let push_routes = Router::new()
        .route("/push-notifications/{id}", get(crate::api::get_push_notification))
        .route("/push-notifications/{id}/delivery-status", patch(crate::api::update_delivery_status))
        .route("/push-notifications/{id}/clicked", post(crate::api::mark_clicked))
        .route("/push-notifications/purchase/{purchase_id}/status", get(crate::api::purchase_status));

    let live_view_routes = Router::new()
        .route("/live-view/status", get(crate::api::live_status))
        .route("/live-view/requests", get(crate::api::live_requests))
        .route("/live-view/queues", get(crate::api::live_queues))
        .route("/live-view/connections", get(crate::api::live_connections))
        .route("/live-view/simulate", post(crate::api::simulate));

    let cluster_routes = Router::new()
        .route("/cluster/status", get(crate::api::cluster_status))
        .route("/cluster/users/{user_id}", get(crate::api::cluster_user_location));

    let notification_facing = event_routes
        .merge(token_routes)
        .merge(push_routes)
        .merge(live_view_routes)
        .merge(cluster_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE));

    let protected_routes = Router::new()
        .route("/stats", get(crate::api::stats))
        .nest("/api/v1", notification_facing)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .merge(ws_routes)
        .merge(health_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build CORS layer from configured origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    use tower_http::cors::AllowOrigin;

    if origins.is_empty() {
        tracing::warn!("CORS: No origins configured, allowing any origin. Configure CORS_ORIGINS for production.");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        tracing::info!("CORS: Restricting to {} configured origins", origins.len());
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                axum::http::header::HeaderName::from_static("x-api-key"),
            ])
    }
}
