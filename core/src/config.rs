//! Queue timing and naming configuration.

use std::time::Duration;

/// Configuration for the admission queue and its background tasks.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use turnstile_core::config::QueueConfig;
///
/// let config = QueueConfig::default()
///     .with_processing_timeout(Duration::from_secs(90))
///     .with_topic_prefix("tickets");
/// assert_eq!(config.sweep_interval, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// How often the timeout sweeper runs
    pub sweep_interval: Duration,
    /// How long a participant may hold the processing slot without a heartbeat
    pub processing_timeout: Duration,
    /// How often the idle reaper runs
    pub reap_interval: Duration,
    /// How long a resource may go without activity before its state is dropped
    pub idle_window: Duration,
    /// Upper bound on one notification publish
    pub publish_timeout: Duration,
    /// Prefix for per-resource notification topics
    pub topic_prefix: String,
}

impl QueueConfig {
    /// Set the sweep interval
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the processing timeout
    #[must_use]
    pub const fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }

    /// Set the reap interval
    #[must_use]
    pub const fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Set the idle window
    #[must_use]
    pub const fn with_idle_window(mut self, window: Duration) -> Self {
        self.idle_window = window;
        self
    }

    /// Set the publish timeout
    #[must_use]
    pub const fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Set the topic prefix
    #[must_use]
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            processing_timeout: Duration::from_secs(60),
            reap_interval: Duration::from_secs(60 * 60),
            idle_window: Duration::from_secs(24 * 60 * 60),
            publish_timeout: Duration::from_secs(1),
            topic_prefix: "queue".to_string(),
        }
    }
}
