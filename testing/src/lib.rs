//! # Turnstile Testing
//!
//! Testing utilities and helpers for the Turnstile admission queue.
//!
//! This crate provides:
//! - A controllable clock so timeouts and idle windows can be simulated
//! - Publishers that record, reject or hang on notifications
//! - Fixture helpers and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use turnstile_testing::{test_clock, RecordingPublisher};
//!
//! #[tokio::test]
//! async fn test_reclaim() {
//!     let clock = test_clock();
//!     let publisher = RecordingPublisher::new();
//!     let manager = QueueManager::new(QueueConfig::default(), clock.shared(), publisher.shared());
//!
//!     manager.join(&event("E1"), Some(participant("a")), contact("a")).await;
//!     manager.promote_next(&event("E1")).await;
//!
//!     clock.advance(Duration::from_secs(61));
//!     let report = manager.sweep().await;
//!     assert_eq!(report.reclaimed, 1);
//! }
//! ```

pub mod mocks;

/// Test helpers and fixtures.
pub mod helpers {
    use turnstile_core::{ContactInfo, ParticipantId, ResourceId};

    /// Build a resource id, panicking on invalid input.
    ///
    /// # Panics
    ///
    /// Panics if `id` is blank.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn event(id: &str) -> ResourceId {
        ResourceId::new(id).expect("fixture resource id should be valid")
    }

    /// Build a participant id, panicking on invalid input.
    ///
    /// # Panics
    ///
    /// Panics if `id` is blank.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn participant(id: &str) -> ParticipantId {
        ParticipantId::new(id).expect("fixture participant id should be valid")
    }

    /// Contact info with a name and no email.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn contact(name: &str) -> ContactInfo {
        ContactInfo::new(name, None).expect("fixture contact should be valid")
    }

    /// Contact info with a name and an email.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank or `email` is malformed.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn contact_with_email(name: &str, email: &str) -> ContactInfo {
        ContactInfo::new(name, Some(email.to_string())).expect("fixture contact should be valid")
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Strategy for short participant names.
    pub fn participant_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,11}"
    }

    /// Strategy for a list of distinct participant names.
    pub fn distinct_participants(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(participant_name(), 0..max).prop_map(|names| {
            let mut seen = HashSet::new();
            names
                .into_iter()
                .filter(|name| seen.insert(name.clone()))
                .collect()
        })
    }

    /// An operation against a single resource's queue.
    #[derive(Debug, Clone)]
    pub enum QueueOp {
        /// Join with the participant at this index of the name pool
        Join(usize),
        /// Promote the head of the waiting list
        Promote,
        /// Complete the participant at this index of the name pool
        Complete(usize),
    }

    /// Strategy for sequences of queue operations over a pool of `pool` names.
    pub fn queue_ops(pool: usize, max_len: usize) -> impl Strategy<Value = Vec<QueueOp>> {
        let op = prop_oneof![
            4 => (0..pool).prop_map(QueueOp::Join),
            1 => Just(QueueOp::Promote),
            1 => (0..pool).prop_map(QueueOp::Complete),
        ];
        prop::collection::vec(op, 0..max_len)
    }
}

// Re-export commonly used items
pub use mocks::{FailingPublisher, FixedClock, HangingPublisher, RecordingPublisher, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::environment::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
