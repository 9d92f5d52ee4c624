//! Application state for Axum handlers.

use crate::handlers::websocket_topics::TopicBroadcaster;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use turnstile_core::QueueNotification;
use turnstile_runtime::QueueManager;

/// Default cap on concurrent WebSocket connections.
pub const DEFAULT_MAX_WS_CONNECTIONS: usize = 1000;

/// Application state shared across all HTTP handlers.
///
/// Cloning is cheap; every field is shared.
///
/// # Examples
///
/// ```ignore
/// let broadcaster = TopicBroadcaster::new();
/// let manager = Arc::new(QueueManager::new(config, clock, Arc::new(broadcaster.clone())));
/// let state = AppState::new(manager, broadcaster);
/// let app = build_router(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The admission queue
    pub manager: Arc<QueueManager>,

    /// Pub/sub transport the manager publishes to and sockets subscribe to
    pub broadcaster: TopicBroadcaster<QueueNotification>,

    /// Prometheus handle, `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,

    /// Open WebSocket connections
    pub ws_connections: Arc<AtomicUsize>,

    /// Cap on open WebSocket connections
    pub max_ws_connections: usize,
}

impl AppState {
    /// Create application state without metrics.
    #[must_use]
    pub fn new(
        manager: Arc<QueueManager>,
        broadcaster: TopicBroadcaster<QueueNotification>,
    ) -> Self {
        Self {
            manager,
            broadcaster,
            metrics: None,
            ws_connections: Arc::new(AtomicUsize::new(0)),
            max_ws_connections: DEFAULT_MAX_WS_CONNECTIONS,
        }
    }

    /// Serve Prometheus metrics from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// Override the WebSocket connection cap.
    #[must_use]
    pub const fn with_max_ws_connections(mut self, max: usize) -> Self {
        self.max_ws_connections = max;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("manager", &self.manager)
            .field("metrics_enabled", &self.metrics.is_some())
            .field("max_ws_connections", &self.max_ws_connections)
            .finish_non_exhaustive()
    }
}
