//! Mock implementations of the queue's environment seams.

use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use turnstile_core::environment::Clock;
use turnstile_core::{PublishError, QueueNotification, QueuePublisher};

/// Controllable clock for deterministic tests
///
/// Returns the same time until it is explicitly moved with
/// [`advance`](Self::advance) or [`set`](Self::set). Clones share the same
/// underlying time, so a clone handed to the queue moves with the original.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use turnstile_testing::mocks::FixedClock;
/// use turnstile_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// let before = clock.now();
/// assert_eq!(before, clock.now());
///
/// clock.advance(Duration::from_secs(61));
/// assert_eq!((clock.now() - before).num_seconds(), 61);
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a new clock frozen at the given time
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if `by` does not fit in a `chrono::TimeDelta`.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).expect("advance should fit in a TimeDelta");
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += delta;
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// The clock as a shareable trait object.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Clock> {
        Arc::new(self.clone())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a default clock for tests (2025-01-01 00:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Publisher that records every notification it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, QueueNotification)>>>,
}

impl RecordingPublisher {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(topic, notification)` pairs received so far, in order
    #[must_use]
    pub fn published(&self) -> Vec<(String, QueueNotification)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications received
    #[must_use]
    pub fn count(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Most recent notification, if any
    #[must_use]
    pub fn last(&self) -> Option<(String, QueueNotification)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The recorder as a shareable trait object
    #[must_use]
    pub fn shared(&self) -> Arc<dyn QueuePublisher> {
        Arc::new(self.clone())
    }
}

impl QueuePublisher for RecordingPublisher {
    fn publish(
        &self,
        topic: &str,
        notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), notification.clone()));
        Box::pin(async { Ok(()) })
    }
}

/// Publisher whose transport is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPublisher;

impl QueuePublisher for FailingPublisher {
    fn publish(
        &self,
        topic: &str,
        _notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            Err(PublishError::Failed {
                topic,
                reason: "transport unavailable".to_string(),
            })
        })
    }
}

/// Publisher whose transport never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HangingPublisher;

impl QueuePublisher for HangingPublisher {
    fn publish(
        &self,
        _topic: &str,
        _notification: &QueueNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        Box::pin(futures::future::pending())
    }
}
