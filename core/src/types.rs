//! Identity and entry types for the admission queue.
//!
//! Identifiers are validated newtypes: once a [`ResourceId`] or [`ParticipantId`]
//! exists it is known to be non-blank, so the queue operations themselves never
//! have to re-check caller input.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a protected resource (an event's ticket-purchase flow).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource identifier.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidResource`] if the identifier is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, QueueError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(QueueError::InvalidResource);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity of a caller contending for a resource.
///
/// Authenticated callers use their account id; anonymous callers use the
/// queue token minted for them on join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant identifier.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidParticipant`] if the identifier is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, QueueError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(QueueError::InvalidParticipant);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl From<QueueToken> for ParticipantId {
    fn from(token: QueueToken) -> Self {
        Self(token.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token handed back on join so a caller can re-identify itself.
///
/// Tokens are random v4 UUIDs in simple (unhyphenated) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueToken(String);

impl QueueToken {
    /// Mint a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse a token presented by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidQueueToken`] if the value is blank.
    pub fn parse(token: impl Into<String>) -> Result<Self, QueueError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(QueueError::InvalidQueueToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for QueueToken {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<QueueToken> for String {
    fn from(token: QueueToken) -> Self {
        token.0
    }
}

impl fmt::Display for QueueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contact details supplied on join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Display name
    pub name: String,
    /// Optional email address
    pub email: Option<String>,
}

impl ContactInfo {
    /// Create contact info, trimming both fields and treating a blank email as absent.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidContact`] if the name is blank or the email
    /// is not of the form `local@domain`.
    pub fn new(name: impl Into<String>, email: Option<String>) -> Result<Self, QueueError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(QueueError::InvalidContact("name is required".to_string()));
        }

        let email = email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        if let Some(email) = &email {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                return Err(QueueError::InvalidContact(format!(
                    "malformed email address: {email}"
                )));
            }
        }

        Ok(Self { name, email })
    }

    /// Whether both contacts carry the same email (ASCII case-insensitive).
    ///
    /// Contacts without an email never match.
    #[must_use]
    pub fn same_email(&self, other: &Self) -> bool {
        match (&self.email, &other.email) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// A participant waiting for the processing slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    /// Who is waiting
    pub participant_id: ParticipantId,
    /// Token handed back to the caller
    pub queue_token: QueueToken,
    /// Contact details given on join
    pub contact: ContactInfo,
    /// Arrival time
    pub joined_at: DateTime<Utc>,
}

/// A participant holding the exclusive right to complete a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingEntry {
    /// Who is processing
    pub participant_id: ParticipantId,
    /// Token the participant was admitted with
    pub queue_token: QueueToken,
    /// Contact details given on join
    pub contact: ContactInfo,
    /// When the participant was admitted (refreshed on every heartbeat)
    pub started_at: DateTime<Utc>,
}

impl ProcessingEntry {
    /// Admit a waiting entry into the processing slot at `now`.
    #[must_use]
    pub fn admit(entry: WaitingEntry, now: DateTime<Utc>) -> Self {
        Self {
            participant_id: entry.participant_id,
            queue_token: entry.queue_token,
            contact: entry.contact,
            started_at: now,
        }
    }
}

/// Result of a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    /// Token identifying the caller's entry
    pub queue_token: QueueToken,
    /// Participant id the entry is keyed by
    pub participant_id: ParticipantId,
    /// 1-based waiting position, or 0 while processing
    pub position: usize,
    /// Current waiting-list length
    pub total: usize,
    /// Whether the caller currently holds the processing slot
    pub is_processing: bool,
}

/// Where an identifier currently sits in a resource's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "position")]
pub enum Placement {
    /// Holding the processing slot
    Processing,
    /// Waiting at the given 1-based position
    Waiting(usize),
    /// Not present in the queue
    NotInQueue,
}

/// Result of a position lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionReport {
    /// Where the identifier sits
    pub placement: Placement,
    /// Current waiting-list length
    pub total: usize,
    /// Token of the matched entry, if any
    pub queue_token: Option<QueueToken>,
}

impl PositionReport {
    /// Report for an identifier that is not queued.
    #[must_use]
    pub const fn not_in_queue(total: usize) -> Self {
        Self {
            placement: Placement::NotInQueue,
            total,
            queue_token: None,
        }
    }

    /// Position as exposed to callers: 0 while processing, the 1-based index
    /// while waiting and -1 when not in the queue.
    #[must_use]
    pub fn position(&self) -> i64 {
        match self.placement {
            Placement::Processing => 0,
            Placement::Waiting(position) => i64::try_from(position).unwrap_or(i64::MAX),
            Placement::NotInQueue => -1,
        }
    }

    /// Whether the identifier holds the processing slot.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(self.placement, Placement::Processing)
    }
}

/// Read-only snapshot of a resource's queue for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Waiting-list length
    pub waiting_count: usize,
    /// Participants holding the processing slot, oldest admission first
    pub processing_ids: Vec<ParticipantId>,
    /// Waiting plus processing
    pub total: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_trims_and_rejects_blank() {
        assert_eq!(ResourceId::new("  E1 ").unwrap().as_str(), "E1");
        assert!(matches!(ResourceId::new("   "), Err(QueueError::InvalidResource)));
        assert!(matches!(ResourceId::new(""), Err(QueueError::InvalidResource)));
    }

    #[test]
    fn test_participant_id_rejects_blank() {
        assert!(matches!(
            ParticipantId::new(" "),
            Err(QueueError::InvalidParticipant)
        ));
    }

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = QueueToken::generate();
        let b = QueueToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_contact_blank_email_is_absent() {
        let contact = ContactInfo::new("Ada", Some("   ".to_string())).unwrap();
        assert_eq!(contact.email, None);
    }

    #[test]
    fn test_contact_rejects_malformed_email() {
        assert!(ContactInfo::new("Ada", Some("ada.example.com".to_string())).is_err());
        assert!(ContactInfo::new("Ada", Some("@example.com".to_string())).is_err());
        assert!(ContactInfo::new(" ", None).is_err());
    }

    #[test]
    fn test_same_email_is_case_insensitive() {
        let a = ContactInfo::new("Ada", Some("Ada@Example.com".to_string())).unwrap();
        let b = ContactInfo::new("Grace", Some("ada@example.com".to_string())).unwrap();
        let c = ContactInfo::new("Alan", None).unwrap();
        assert!(a.same_email(&b));
        assert!(!a.same_email(&c));
        assert!(!c.same_email(&c));
    }

    #[test]
    fn test_position_sentinels() {
        assert_eq!(PositionReport::not_in_queue(3).position(), -1);
        let processing = PositionReport {
            placement: Placement::Processing,
            total: 2,
            queue_token: None,
        };
        assert_eq!(processing.position(), 0);
        assert!(processing.is_processing());
    }

    #[test]
    fn test_resource_id_deserialize_validates() {
        let ok: ResourceId = serde_json::from_str("\"E1\"").unwrap();
        assert_eq!(ok.as_str(), "E1");
        assert!(serde_json::from_str::<ResourceId>("\"  \"").is_err());
    }
}
