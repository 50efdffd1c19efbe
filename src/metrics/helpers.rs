//! Thin, named wrappers around the raw `lazy_static` metric handles in
//! `super`. Call sites read as `ClusterMetrics::record_message_routed()`
//! rather than reaching for the raw counter directly.

use prometheus::{Encoder, TextEncoder};

use super::*;

pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct MessageMetrics;

impl MessageMetrics {
    pub fn record_sent(target: &str) {
        MESSAGES_SENT_TOTAL.with_label_values(&[target]).inc();
    }

    pub fn record_delivered() {
        MESSAGES_DELIVERED_TOTAL.inc();
    }

    pub fn record_failed() {
        MESSAGES_FAILED_TOTAL.inc();
    }

    pub fn observe_delivery_latency(seconds: f64) {
        MESSAGE_DELIVERY_LATENCY.observe(seconds);
    }
}

pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_received(message_type: &str) {
        WS_MESSAGES_RECEIVED.with_label_values(&[message_type]).inc();
    }
}

pub struct RateLimitMetrics;

impl RateLimitMetrics {
    pub fn record_allowed(kind: &str) {
        RATELIMIT_ALLOWED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_denied(kind: &str) {
        RATELIMIT_DENIED_TOTAL.with_label_values(&[kind]).inc();
    }
}

pub struct AckMetrics;

impl AckMetrics {
    pub fn record_received() {
        ACK_RECEIVED_TOTAL.inc();
    }
}

pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn observe_round_duration(millis: f64) {
        HEARTBEAT_DURATION_MS.observe(millis);
    }

    pub fn record_timeout() {
        HEARTBEAT_TIMEOUTS.inc();
    }
}

pub struct ClusterMetrics;

impl ClusterMetrics {
    pub fn set_enabled(enabled: bool) {
        CLUSTER_ENABLED.set(if enabled { 1 } else { 0 });
    }

    pub fn set_cluster_connections(count: i64) {
        CLUSTER_CONNECTIONS_TOTAL.set(count);
    }

    pub fn set_cluster_users(count: i64) {
        CLUSTER_USERS_TOTAL.set(count);
    }

    pub fn record_session_refreshed() {
        CLUSTER_SESSIONS_REFRESHED.inc();
    }

    pub fn record_message_routed() {
        CLUSTER_MESSAGES_ROUTED.inc();
    }

    pub fn record_message_received() {
        CLUSTER_MESSAGES_RECEIVED.inc();
    }
}
