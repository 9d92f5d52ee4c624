//! Health check and metrics endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use turnstile_runtime::{HealthCheck, HealthStatus};

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the process answers
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running. This endpoint does
/// NOT inspect the queue.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness check with queue diagnostics.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded (a failing notification transport does not
///   stop the queue from serving)
/// - 503 Service Unavailable: Unhealthy
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "component": "admission_queue",
///   "status": "healthy",
///   "metadata": [["resources", "2"], ["waiting", "17"], ["processing", "2"]]
/// }
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.manager.health();

    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(health))
}

/// Prometheus scrape endpoint.
///
/// Returns 404 when metrics are disabled.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::handlers::websocket_topics::TopicBroadcaster;
    use std::sync::Arc;
    use turnstile_core::QueueConfig;
    use turnstile_runtime::QueueManager;
    use turnstile_testing::test_clock;

    fn state() -> AppState {
        let broadcaster = TopicBroadcaster::new();
        let manager = Arc::new(QueueManager::new(
            QueueConfig::default(),
            test_clock().shared(),
            Arc::new(broadcaster.clone()),
        ));
        AppState::new(manager, broadcaster)
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_readiness_with_empty_queue() {
        let (status, Json(health)) = readiness_check(State(state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.metadata_value("resources"), Some("0"));
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let response = metrics(State(state())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
