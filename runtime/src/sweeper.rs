//! Timeout Sweeper: background reclaim of abandoned processing slots.
//!
//! There is no explicit "abandon" call. A participant who starts the purchase
//! flow and walks away stops heartbeating, and the sweeper hands the slot to
//! the next waiting participant once the processing timeout has passed.
//!
//! # Example
//!
//! ```rust,ignore
//! let (shutdown_tx, _) = broadcast::channel(1);
//! let handle = TimeoutSweeper::new(Arc::clone(&manager), shutdown_tx.subscribe()).spawn();
//!
//! // Later
//! let _ = shutdown_tx.send(());
//! handle.await?;
//! ```

use crate::QueueManager;
use crate::metrics::QueueMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodic task running [`QueueManager::sweep`].
pub struct TimeoutSweeper {
    manager: Arc<QueueManager>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Time between passes (defaults to the manager's sweep interval)
    interval: Duration,
}

impl TimeoutSweeper {
    /// Create a sweeper using the manager's configured interval.
    #[must_use]
    pub fn new(manager: Arc<QueueManager>, shutdown: broadcast::Receiver<()>) -> Self {
        let interval = manager.config().sweep_interval;
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

    /// Spawn the sweeper as a background task.
    ///
    /// The task runs until a shutdown signal is received or the shutdown
    /// sender is dropped.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(interval = ?self.interval, "Timeout sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Timeout sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.pass().await;
                }
            }
        }

        info!("Timeout sweeper stopped");
    }

    async fn pass(&self) {
        let started = Instant::now();
        let report = self.manager.sweep().await;
        QueueMetrics::record_sweep(started.elapsed());

        if report.reclaimed > 0 {
            info!(
                resources = report.resources,
                reclaimed = report.reclaimed,
                promoted = report.promoted,
                "Sweep reclaimed stale processing slots"
            );
        } else {
            debug!("Sweep found no stale processing slots");
        }
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
    async fn test_sweeper_reclaims_on_interval() {
        let clock = test_clock();
        let manager = Arc::new(QueueManager::new(
            QueueConfig::default(),
            clock.shared(),
            RecordingPublisher::new().shared(),
        ));
        let e1 = event("E1");
        manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.join(&e1, Some(participant("b")), contact("b")).await;
        manager.promote_next(&e1).await;

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = TimeoutSweeper::new(Arc::clone(&manager), shutdown_tx.subscribe()).spawn();

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_secs(11)).await;

        let status = manager.status(&e1);
        assert_eq!(status.processing_ids, vec![participant("b")]);
        assert_eq!(status.waiting_count, 0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_sender_dropped() {
        let manager = Arc::new(QueueManager::new(
            QueueConfig::default(),
            test_clock().shared(),
            RecordingPublisher::new().shared(),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = TimeoutSweeper::new(manager, shutdown_rx)
            .with_interval(Duration::from_secs(1))
            .spawn();

        drop(shutdown_tx);
        handle.await.unwrap();
    }
}
