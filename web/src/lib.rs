//! HTTP and WebSocket surface for the Turnstile admission queue.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** the event id from the path and the caller from headers
//! 3. **Validate** input into queue types (`ResourceId`, `ContactInfo`)
//! 4. **Call** the [`QueueManager`](turnstile_runtime::QueueManager)
//! 5. **Map** the result to a JSON response
//!
//! Queue changes fan out through [`TopicBroadcaster`] to WebSocket clients
//! subscribed on `/ws/queue`.
//!
//! # Example
//!
//! ```ignore
//! use turnstile_web::{AppState, TopicBroadcaster, build_router};
//!
//! let broadcaster = TopicBroadcaster::new();
//! let manager = Arc::new(QueueManager::new(config, clock, Arc::new(broadcaster.clone())));
//! let app = build_router(AppState::new(manager, broadcaster));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{Caller, Operator, Role};
pub use handlers::TopicBroadcaster;
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
