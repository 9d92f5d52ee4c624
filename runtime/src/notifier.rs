//! Change Notifier: best-effort queue summaries over the pub/sub transport.
//!
//! Every queue mutation ends with a [`QueueNotification`] published to the
//! resource's topic. Delivery is fire-and-forget: a failed, slow or absent
//! transport is logged and counted, never reported to the caller whose
//! operation triggered it.

use crate::metrics::QueueMetrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use turnstile_core::{
    ChangeKind, DateTime, PublishError, QueueNotification, QueuePublisher, ResourceId,
    ResourceQueueState, Utc, topic_for,
};

/// Publishes queue summaries to per-resource topics.
pub struct ChangeNotifier {
    publisher: Arc<dyn QueuePublisher>,
    topic_prefix: String,
    publish_timeout: Duration,
    /// Failures since the last successful publish
    consecutive_failures: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier over a transport.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn QueuePublisher>,
        topic_prefix: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            topic_prefix: topic_prefix.into(),
            publish_timeout,
            consecutive_failures: AtomicU64::new(0),
        }
    }

    /// Summarize a resource's state after a change.
    ///
    /// Called while the resource lock is held; the result is published after
    /// the lock is released.
    #[must_use]
    pub fn summarize(
        resource_id: &ResourceId,
        state: &ResourceQueueState,
        change: ChangeKind,
        timestamp: DateTime<Utc>,
    ) -> QueueNotification {
        QueueNotification {
            resource_id: resource_id.clone(),
            waiting_count: state.waiting_len(),
            processing_count: state.processing_len(),
            change,
            timestamp,
        }
    }

    /// Topic a resource's notifications go to.
    #[must_use]
    pub fn topic(&self, resource_id: &ResourceId) -> String {
        topic_for(&self.topic_prefix, resource_id)
    }

    /// Publish a notification, swallowing any transport failure.
    pub async fn notify(&self, notification: QueueNotification) {
        let topic = self.topic(&notification.resource_id);
        QueueMetrics::set_waiting(&notification.resource_id, notification.waiting_count);

        let publish = self.publisher.publish(&topic, &notification);
        let result = match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::TimedOut {
                topic: topic.clone(),
            }),
        };

        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                QueueMetrics::record_notification();
                debug!(
                    topic = %topic,
                    change = ?notification.change,
                    waiting = notification.waiting_count,
                    "Published queue notification"
                );
            }
            Err(e) => {
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                QueueMetrics::record_notification_failure();
                warn!(topic = %topic, error = %e, "Queue notification dropped");
            }
        }
    }

    /// Failed publishes since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("topic_prefix", &self.topic_prefix)
            .field("publish_timeout", &self.publish_timeout)
            .field("consecutive_failures", &self.consecutive_failures())
            .finish_non_exhaustive()
    }
}
