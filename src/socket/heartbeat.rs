//! Periodic sweep that evicts connections which have gone quiet. There is no
//! active server-push heartbeat frame: any client message, `ping` included,
//! counts as activity, and this task only tears down what has stopped
//! sending anything at all.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::broadcast;

use crate::cluster::SessionStore;
use crate::metrics::HeartbeatMetrics;

use super::registry::ConnectionManager;

pub struct HeartbeatTask {
    connection_manager: Arc<ConnectionManager>,
    session_store: Arc<dyn SessionStore>,
    interval: StdDuration,
    stale_after: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        session_store: Arc<dyn SessionStore>,
        interval: StdDuration,
        stale_after: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            connection_manager,
            session_store,
            interval,
            stale_after,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("heartbeat sweep stopping on shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    let started = std::time::Instant::now();
                    let evicted = self.connection_manager.cleanup_stale(self.stale_after);
                    if evicted > 0 {
                        tracing::info!(evicted, "swept stale socket connections");
                    }

                    if self.session_store.is_enabled() {
                        if let Err(e) = self.session_store.refresh_sessions().await {
                            tracing::warn!(error = %e, "failed to refresh cluster sessions");
                        }
                    }

                    HeartbeatMetrics::observe_round_duration(started.elapsed().as_secs_f64() * 1000.0);
                }
            }
        }
    }
}
