//! Route table.

use crate::handlers::{health, queue, websocket_topics};
use crate::state::AppState;
use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router.
///
/// Every request gets an `x-request-id` (generated unless the client sent
/// one), a tracing span carrying it, and the same id echoed on the response.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events/:id/queue/join", post(queue::join))
        .route("/events/:id/queue/position", get(queue::position))
        .route("/events/:id/queue/promote", post(queue::promote))
        .route("/events/:id/queue/complete", post(queue::complete))
        .route("/events/:id/queue/status", get(queue::status));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/ws/queue", get(websocket_topics::queue_updates))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(REQUEST_ID_HEADER)
                            .and_then(|value| value.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
