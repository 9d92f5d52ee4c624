//! # Turnstile Runtime
//!
//! The operational side of the admission queue.
//!
//! ## Core Components
//!
//! - **Queue Manager** ([`QueueManager`]): join, position, promotion, completion
//! - **Queue State Store** ([`store::QueueStore`]): per-resource locked state
//! - **Change Notifier** ([`notifier::ChangeNotifier`]): best-effort summaries
//! - **Timeout Sweeper** ([`TimeoutSweeper`]): reclaims stale processing slots
//! - **Idle Reaper** ([`IdleReaper`]): discards state of idle resources
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use turnstile_core::environment::SystemClock;
//! use turnstile_core::{ContactInfo, NoopPublisher, QueueConfig, ResourceId};
//! use turnstile_runtime::QueueManager;
//!
//! # async fn example() -> Result<(), turnstile_core::QueueError> {
//! let manager = QueueManager::new(
//!     QueueConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(NoopPublisher),
//! );
//!
//! let event = ResourceId::new("E1")?;
//! let joined = manager.join(&event, None, ContactInfo::new("Ada", None)?).await;
//! assert_eq!(joined.position, 1);
//!
//! let promoted = manager.promote_next(&event).await;
//! assert!(promoted.is_some());
//! # Ok(())
//! # }
//! ```

/// Health reporting
pub mod health;

/// Queue Manager operations
pub mod manager;

/// Prometheus metrics for observability
pub mod metrics;

/// Change notification over the pub/sub transport
pub mod notifier;

/// Idle resource reaping
pub mod reaper;

/// Per-resource queue state storage
pub mod store;

/// Processing timeout sweeping
pub mod sweeper;

pub use health::{HealthCheck, HealthStatus};
pub use manager::{QueueManager, ReapReport, SweepReport};
pub use reaper::IdleReaper;
pub use sweeper::TimeoutSweeper;
