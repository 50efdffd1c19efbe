//! API layer - HTTP endpoint handlers organized by domain.

mod cluster;
mod health;
mod live_view;
mod metrics;
mod push;
mod routes;
mod tokens;

pub use cluster::{cluster_status, cluster_user_location};
pub use health::{health, stats};
pub use live_view::{connections as live_connections, queues as live_queues, requests as live_requests, simulate, status as live_status};
pub use metrics::prometheus_metrics;
pub use push::{get_push_notification, mark_clicked, purchase_status, update_delivery_status};
pub use routes::{
    create_friend_request, create_login, create_purchase, create_reset_password, create_signup,
    friend_request_status, login_alert_status, login_in_app_status, purchase_push_mirror_status,
    reset_password_status, welcome_email_status,
};
pub use tokens::{
    cleanup_expired, delete_token, mark_stale_sweep, refresh_token, register_token, token_statistics,
    tokens_for_user,
};
