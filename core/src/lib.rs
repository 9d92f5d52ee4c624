//! # Turnstile Core
//!
//! Core types and traits for the Turnstile ticket-purchase admission queue.
//!
//! This crate holds the data model and the seams to the outside world; the
//! behavior lives in `turnstile-runtime`.
//!
//! ## Core Concepts
//!
//! - **Resource**: the contested entity being queued for (an event's purchase flow)
//! - **Participant**: a caller, authenticated or anonymous, contending for a resource
//! - **Waiting list**: strict arrival-ordered (FIFO) list of participants
//! - **Processing slot**: participants admitted to complete a purchase
//! - **Queue token**: opaque id handed back on join for later re-identification
//!
//! ## Seams
//!
//! - [`environment::Clock`]: all timestamps come from an injected clock
//! - [`publisher::QueuePublisher`]: publish side of the pub/sub transport
//!
//! ## Example
//!
//! ```
//! use turnstile_core::{ContactInfo, ResourceId, ResourceQueueState, Utc};
//!
//! let resource = ResourceId::new("E1")?;
//! let contact = ContactInfo::new("Ada", Some("ada@example.com".to_string()))?;
//! let state = ResourceQueueState::new(Utc::now());
//! assert!(state.is_empty());
//! assert_eq!(resource.as_str(), "E1");
//! assert!(contact.email.is_some());
//! # Ok::<(), turnstile_core::QueueError>(())
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod config;
pub mod error;
pub mod publisher;
pub mod state;
pub mod types;

pub use config::QueueConfig;
pub use error::{PublishError, QueueError};
pub use publisher::{ChangeKind, NoopPublisher, QueueNotification, QueuePublisher, topic_for};
pub use state::ResourceQueueState;
pub use types::{
    ContactInfo, JoinOutcome, ParticipantId, Placement, PositionReport, ProcessingEntry,
    QueueStatus, QueueToken, ResourceId, WaitingEntry,
};

/// Environment module - Dependency injection traits
///
/// External dependencies the queue needs from its host are abstracted behind
/// traits and injected at construction.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    ///
    /// // Test - controllable time for deterministic tests
    /// let clock = test_clock();
    /// clock.advance(Duration::from_secs(61));
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
