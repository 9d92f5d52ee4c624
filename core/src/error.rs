//! Error types for queue operations.
//!
//! Only caller contract violations are errors. A participant or resource that
//! is absent from the queue is reported through ordinary result values.

use thiserror::Error;

/// Invalid input supplied to the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Resource identifier missing or blank
    #[error("resource id is required")]
    InvalidResource,

    /// Participant identifier blank
    #[error("participant id must not be blank")]
    InvalidParticipant,

    /// Queue token blank
    #[error("queue token must not be blank")]
    InvalidQueueToken,

    /// Contact details rejected
    #[error("invalid contact info: {0}")]
    InvalidContact(String),
}

/// Failure reported by a publish/subscribe transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The transport refused or failed to deliver the payload
    #[error("publish to topic '{topic}' failed: {reason}")]
    Failed {
        /// Topic the payload was addressed to
        topic: String,
        /// Transport-specific reason
        reason: String,
    },

    /// The transport did not answer within the publish timeout
    #[error("publish to topic '{topic}' timed out")]
    TimedOut {
        /// Topic the payload was addressed to
        topic: String,
    },
}
