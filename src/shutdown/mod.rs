//! Graceful shutdown: stop accepting new work, let in-flight queue jobs
//! drain, then wait for sockets to close.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::queue::{ChannelFamily, QueueSubstrate, QueueTopology, Tier};
use crate::socket::ConnectionManager;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for queued jobs to drain (default: 15 seconds)
    pub queue_drain_timeout: Duration,
    /// Time to wait for sockets to close (default: 10 seconds)
    pub connection_drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            queue_drain_timeout: Duration::from_secs(15),
            connection_drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Coordinates an orderly shutdown: signal workers first (via the shared
/// broadcast channel every worker/heartbeat/balancer task selects against),
/// then give the substrate and open sockets a bounded window to settle.
pub struct GracefulShutdown {
    connection_manager: Arc<ConnectionManager>,
    queue_substrate: Arc<dyn QueueSubstrate>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        queue_substrate: Arc<dyn QueueSubstrate>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            connection_manager,
            queue_substrate,
            shutdown_tx,
            config: ShutdownConfig::default(),
        }
    }

    pub fn with_config(
        connection_manager: Arc<ConnectionManager>,
        queue_substrate: Arc<dyn QueueSubstrate>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            connection_manager,
            queue_substrate,
            shutdown_tx,
            config,
        }
    }

    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.connection_manager.stats().total_connections)
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "graceful shutdown: signaling background tasks");
        let _ = self.shutdown_tx.send(());

        tracing::info!("graceful shutdown: draining queues");
        result.queue_drained = self.drain_queues().await;

        tracing::info!("graceful shutdown: waiting for sockets to close");
        result.connections_closed = self.wait_for_connections_to_close().await;

        result.duration = start.elapsed();
        result.success = true;

        tracing::info!(
            connections_closed = result.connections_closed,
            queue_drained = result.queue_drained,
            duration_ms = result.duration.as_millis(),
            "graceful shutdown complete"
        );

        result
    }

    async fn total_queue_depth(&self) -> usize {
        let mut total = 0;
        for family in [ChannelFamily::Email, ChannelFamily::InApp, ChannelFamily::Push] {
            let topology = QueueTopology::new(family);
            for tier in Tier::ALL {
                total += self
                    .queue_substrate
                    .depth(&topology.queue_name(tier))
                    .await
                    .unwrap_or(0);
            }
        }
        total
    }

    async fn drain_queues(&self) -> bool {
        if !self.queue_substrate.is_enabled() {
            return true;
        }
        if self.total_queue_depth().await == 0 {
            return true;
        }

        let drain_future = async {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if self.total_queue_depth().await == 0 {
                    break;
                }
            }
        };

        match timeout(self.config.queue_drain_timeout, drain_future).await {
            Ok(_) => true,
            Err(_) => {
                let remaining = self.total_queue_depth().await;
                tracing::warn!(remaining, "queue drain timeout, some jobs remain queued");
                false
            }
        }
    }

    async fn wait_for_connections_to_close(&self) -> usize {
        let initial = self.connection_manager.stats().total_connections;
        if initial == 0 {
            return 0;
        }

        let wait_future = async {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if self.connection_manager.stats().total_connections == 0 {
                    break;
                }
            }
        };

        let _ = timeout(self.config.connection_drain_timeout, wait_future).await;

        let final_count = self.connection_manager.stats().total_connections;
        if final_count > 0 {
            tracing::warn!(remaining_connections = final_count, "sockets did not close gracefully");
        }
        initial - final_count
    }
}

#[derive(Debug, Default)]
pub struct ShutdownResult {
    pub success: bool,
    pub connections_closed: usize,
    pub queue_drained: bool,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueueSubstrate;

    fn components() -> (Arc<ConnectionManager>, Arc<dyn QueueSubstrate>, broadcast::Sender<()>) {
        let cm = Arc::new(ConnectionManager::new());
        let substrate: Arc<dyn QueueSubstrate> = Arc::new(InMemoryQueueSubstrate::new(true));
        let (tx, _) = broadcast::channel(1);
        (cm, substrate, tx)
    }

    #[tokio::test]
    async fn shutdown_with_no_connections_or_queue_depth_succeeds_immediately() {
        let (cm, substrate, tx) = components();
        let shutdown = GracefulShutdown::new(cm, substrate, tx);
        let result = shutdown.execute("test shutdown").await;
        assert!(result.success);
        assert!(result.queue_drained);
        assert_eq!(result.connections_closed, 0);
    }

    #[test]
    fn config_defaults_are_bounded() {
        let config = ShutdownConfig::default();
        assert_eq!(config.queue_drain_timeout, Duration::from_secs(15));
        assert_eq!(config.connection_drain_timeout, Duration::from_secs(10));
    }
}
