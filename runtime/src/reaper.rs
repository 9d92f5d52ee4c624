//! Idle Reaper: background discard of queue state nobody is using.
//!
//! A resource whose last activity is older than the idle window loses its
//! whole queue state, residual entries included. There is no persistence, so
//! this cannot be undone.

use crate::QueueManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodic task running [`QueueManager::reap`].
pub struct IdleReaper {
    manager: Arc<QueueManager>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Time between passes (defaults to the manager's reap interval)
    interval: Duration,
}

impl IdleReaper {
    /// Create a reaper using the manager's configured interval.
    #[must_use]
    pub fn new(manager: Arc<QueueManager>, shutdown: broadcast::Receiver<()>) -> Self {
        let interval = manager.config().reap_interval;
        Self {
            manager,
            shutdown,
            interval,
        }
    }

    /// Override the time between passes.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the reaper as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(interval = ?self.interval, "Idle reaper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Idle reaper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.manager.reap();
                    if report.removed.is_empty() {
                        debug!(resources = self.manager.resource_count(), "Reap found no idle resources");
                    } else {
                        info!(
                            removed = report.removed.len(),
                            remaining = self.manager.resource_count(),
                            "Reaped idle queue state"
                        );
                    }
                }
            }
        }

        info!("Idle reaper stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use turnstile_core::QueueConfig;
    use turnstile_testing::helpers::{contact, event, participant};
    use turnstile_testing::{RecordingPublisher, test_clock};

    #[tokio::test(start_paused = true)]
    async fn test_reaper_discards_idle_resources_on_interval() {
        let clock = test_clock();
        let manager = Arc::new(QueueManager::new(
            QueueConfig::default(),
            clock.shared(),
            RecordingPublisher::new().shared(),
        ));
        manager.join(&event("E1"), Some(participant("a")), contact("a")).await;

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = IdleReaper::new(Arc::clone(&manager), shutdown_tx.subscribe())
            .with_interval(Duration::from_secs(60))
            .spawn();

        clock.advance(Duration::from_secs(25 * 3600));
        manager.join(&event("E2"), Some(participant("a")), contact("a")).await;
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!manager.has_resource(&event("E1")));
        assert!(manager.has_resource(&event("E2")));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
