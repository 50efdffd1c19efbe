//! Background health poll, modeled on the socket heartbeat sweep: an
//! interval timer racing a shutdown receiver, ticking a check against every
//! known backend rather than a per-connection timeout.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::service::{Backend, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendHealth {
    Healthy,
    Unhealthy,
}

/// Polls every backend's `/health` endpoint on a fixed interval and keeps a
/// shared healthy/unhealthy map the balancer service reads when selecting a
/// new placement. Existing sticky sessions are not affected by a backend
/// flipping unhealthy; only new placements avoid it.
pub struct HealthPoller {
    backends: Vec<Backend>,
    health: Arc<DashMap<InstanceId, BackendHealth>>,
    client: reqwest::Client,
    poll_interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl HealthPoller {
    pub fn new(
        backends: Vec<Backend>,
        health: Arc<DashMap<InstanceId, BackendHealth>>,
        poll_interval: Duration,
        poll_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(poll_timeout)
            .build()
            .unwrap_or_default();

        for backend in &backends {
            health.insert(backend.id.clone(), BackendHealth::Healthy);
        }

        Self {
            backends,
            health,
            client,
            poll_interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("balancer health poll stopping on shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    async fn poll_once(&self) {
        for backend in &self.backends {
            let url = format!("{}/health", backend.address.trim_end_matches('/'));
            let healthy = matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success());

            let new_state = if healthy {
                BackendHealth::Healthy
            } else {
                BackendHealth::Unhealthy
            };

            if let Some(mut entry) = self.health.get_mut(&backend.id) {
                if *entry != new_state {
                    tracing::warn!(instance = %backend.id.as_str(), ?new_state, "backend health changed");
                }
                *entry = new_state;
            } else {
                self.health.insert(backend.id.clone(), new_state);
            }
        }
    }
}
