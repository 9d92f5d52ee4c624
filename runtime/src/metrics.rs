//! Prometheus metrics for the admission queue.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `queue_joins_total{outcome}` - Joins by outcome (appended, already_waiting, heartbeat)
//! - `queue_promotions_total{trigger}` - Promotions by trigger (manual, reclaim)
//! - `queue_completions_total` - Processing slots released by completion
//! - `queue_reclaims_total` - Processing slots reclaimed by the sweeper
//! - `queue_resources_reaped_total` - Idle resources dropped by the reaper
//! - `queue_notifications_published_total` - Notifications delivered to the transport
//! - `queue_notification_failures_total` - Notifications dropped
//!
//! ## Gauges
//! - `queue_resources_active` - Resources with queue state
//! - `queue_waiting{resource}` - Waiting-list length per resource
//!
//! Gauges not updated within the gauge idle timeout are dropped from the
//! scrape output, so series of reaped resources do not accumulate.
//!
//! ## Histograms
//! - `queue_wait_duration_seconds` - Time from join to promotion
//! - `queue_sweep_duration_seconds` - Time taken by one sweep pass
//!
//! # Example
//!
//! ```rust,no_run
//! use turnstile_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // Rendered text is served at GET /metrics
//! let _text = exporter.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use metrics_util::MetricKindMask;
use std::time::Duration;
use thiserror::Error;
use turnstile_core::ResourceId;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// How long an unchanged gauge series stays in the scrape output.
pub const DEFAULT_GAUGE_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 3600);

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder installation.
///
/// Installs the global recorder and keeps the handle used to render the
/// scrape output.
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
    gauge_idle_timeout: Duration,
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .field("gauge_idle_timeout", &self.gauge_idle_timeout)
            .finish()
    }
}

impl Default for MetricsExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handle: None,
            gauge_idle_timeout: DEFAULT_GAUGE_IDLE_TIMEOUT,
        }
    }

    /// Drop gauge series that have not changed for `timeout`.
    ///
    /// Should exceed the reap interval so `queue_resources_active`, which
    /// every reap pass refreshes, never lapses.
    #[must_use]
    pub const fn with_gauge_idle_timeout(mut self, timeout: Duration) -> Self {
        self.gauge_idle_timeout = timeout;
        self
    }

    fn builder(&self) -> Result<PrometheusBuilder, MetricsError> {
        PrometheusBuilder::new()
            .idle_timeout(MetricKindMask::GAUGE, Some(self.gauge_idle_timeout))
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), the call succeeds
    /// without a handle and [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match self.builder()?.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "queue_joins_total",
        "Total joins by outcome (appended, already_waiting, heartbeat)"
    );
    describe_counter!(
        "queue_promotions_total",
        "Total promotions into the processing slot by trigger (manual, reclaim)"
    );
    describe_counter!(
        "queue_completions_total",
        "Total processing slots released by completion"
    );
    describe_counter!(
        "queue_reclaims_total",
        "Total processing slots reclaimed after timing out"
    );
    describe_counter!(
        "queue_resources_reaped_total",
        "Total idle resources whose queue state was discarded"
    );
    describe_counter!(
        "queue_notifications_published_total",
        "Total queue notifications delivered to the transport"
    );
    describe_counter!(
        "queue_notification_failures_total",
        "Total queue notifications dropped after a transport failure or timeout"
    );
    describe_gauge!(
        "queue_resources_active",
        "Current number of resources with queue state"
    );
    describe_gauge!("queue_waiting", "Current waiting-list length per resource");
    describe_histogram!(
        "queue_wait_duration_seconds",
        "Time from joining the waiting list to promotion"
    );
    describe_histogram!(
        "queue_sweep_duration_seconds",
        "Time taken by one timeout sweep pass"
    );
}

/// Queue metrics recorder.
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a join and how it resolved.
    pub fn record_join(outcome: &'static str) {
        counter!("queue_joins_total", "outcome" => outcome).increment(1);
    }

    /// Record a promotion and how long the participant waited.
    pub fn record_promotion(trigger: &'static str, waited: Duration) {
        counter!("queue_promotions_total", "trigger" => trigger).increment(1);
        histogram!("queue_wait_duration_seconds").record(waited.as_secs_f64());
    }

    /// Record a completion.
    pub fn record_completion() {
        counter!("queue_completions_total").increment(1);
    }

    /// Record reclaimed processing slots.
    pub fn record_reclaims(count: usize) {
        counter!("queue_reclaims_total").increment(count as u64);
    }

    /// Record a sweep pass.
    pub fn record_sweep(duration: Duration) {
        histogram!("queue_sweep_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record reaped resources.
    pub fn record_reaped(count: usize) {
        counter!("queue_resources_reaped_total").increment(count as u64);
    }

    /// Record the number of resources with state.
    pub fn set_active_resources(count: usize) {
        // Resource counts stay far below 2^53
        #[allow(clippy::cast_precision_loss)]
        gauge!("queue_resources_active").set(count as f64);
    }

    /// Record a resource's waiting-list length.
    pub fn set_waiting(resource_id: &ResourceId, waiting: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("queue_waiting", "resource" => resource_id.to_string()).set(waiting as f64);
    }

    /// Record a delivered notification.
    pub fn record_notification() {
        counter!("queue_notifications_published_total").increment(1);
    }

    /// Record a dropped notification.
    pub fn record_notification_failure() {
        counter!("queue_notification_failures_total").increment(1);
    }
}
