//! Reaper: the three periodic sweepers that keep the token registry and
//! tracking tables bounded. Scheduling follows the same interval-timer +
//! `tokio::select!`-against-shutdown shape as the socket heartbeat sweep;
//! each sweep is bounded-batch and idempotent, so it is safe for more than
//! one instance to run it concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::CleanupConfig;
use crate::store::NotificationStore;
use crate::token_registry::TokenRegistry;

pub struct Reaper {
    store: Arc<dyn NotificationStore>,
    tokens: Arc<dyn TokenRegistry>,
    config: CleanupConfig,
    shutdown: broadcast::Receiver<()>,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        tokens: Arc<dyn TokenRegistry>,
        config: CleanupConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            tokens,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.sweep_interval_seconds));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("reaper stopping on shutdown");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    async fn sweep_once(&self) {
        let now = chrono::Utc::now();

        match self.tokens.sweep_stale(now).await {
            Ok(count) if count > 0 => tracing::info!(count, "marked stale fcm tokens"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to sweep stale tokens"),
        }

        match self.tokens.delete_expired(now, self.config.sweep_batch_size).await {
            Ok(count) if count > 0 => tracing::info!(count, "deleted expired fcm tokens"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to delete expired tokens"),
        }

        let retention_cutoff = now - chrono::Duration::days(self.config.record_retention_days);
        match self
            .store
            .delete_terminal_records_older_than(retention_cutoff, self.config.sweep_batch_size)
            .await
        {
            Ok(count) if count > 0 => tracing::info!(count, "deleted terminal tracking records past retention"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to delete terminal tracking records"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::token_registry::InMemoryTokenRegistry;

    #[tokio::test]
    async fn sweep_once_runs_all_three_sweepers_without_panicking() {
        let store: Arc<dyn NotificationStore> = Arc::new(InMemoryStore::new());
        let tokens: Arc<dyn TokenRegistry> = Arc::new(InMemoryTokenRegistry::new());
        let (_tx, rx) = broadcast::channel(1);
        let reaper = Reaper::new(store, tokens, CleanupConfig::default(), rx);
        reaper.sweep_once().await;
    }
}
