//! Publish/subscribe boundary for queue change notifications.
//!
//! The queue never talks to subscribers directly. It hands a
//! [`QueueNotification`] to a [`QueuePublisher`] addressed to the resource's
//! topic, and the transport fans it out to whoever joined that topic.
//!
//! # Topic Naming Convention
//!
//! Topics follow the pattern `{prefix}:{resource-id}`, e.g. `queue:E1`.

use crate::error::PublishError;
use crate::types::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// What kind of mutation triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A participant was appended to the waiting list
    Joined,
    /// The head of the waiting list was admitted
    Promoted,
    /// A processing participant finished
    Completed,
    /// A stale processing slot was reclaimed by the sweeper
    Reclaimed,
}

/// Queue summary published to a resource's topic after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNotification {
    /// Resource whose queue changed
    pub resource_id: ResourceId,
    /// Waiting-list length after the change
    pub waiting_count: usize,
    /// Processing participants after the change
    pub processing_count: usize,
    /// Mutation that produced this notification
    pub change: ChangeKind,
    /// When the change happened
    pub timestamp: DateTime<Utc>,
}

/// Build the topic name for a resource.
#[must_use]
pub fn topic_for(prefix: &str, resource_id: &ResourceId) -> String {
    format!("{prefix}:{resource_id}")
}

/// Publish side of a publish/subscribe transport.
///
/// Subscribers join and leave topics through the transport itself; the queue
/// only ever publishes.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the queue can hold an
/// `Arc<dyn QueuePublisher>`.
pub trait QueuePublisher: Send + Sync {
    /// Publish a notification to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Failed`] if the transport cannot deliver it.
    fn publish(
        &self,
        topic: &str,
        notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;
}

/// Transport used when none is configured. Accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl QueuePublisher for NoopPublisher {
    fn publish(
        &self,
        _topic: &str,
        _notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_topic_for() {
        let id = ResourceId::new("E1").unwrap();
        assert_eq!(topic_for("queue", &id), "queue:E1");
    }

    #[test]
    fn test_notification_wire_format() {
        let notification = QueueNotification {
            resource_id: ResourceId::new("E1").unwrap(),
            waiting_count: 2,
            processing_count: 1,
            change: ChangeKind::Reclaimed,
            timestamp: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["resource_id"], "E1");
        assert_eq!(json["waiting_count"], 2);
        assert_eq!(json["change"], "reclaimed");
    }
}
