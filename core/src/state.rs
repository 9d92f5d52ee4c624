//! Per-resource queue state.
//!
//! [`ResourceQueueState`] is plain data: an arrival-ordered waiting list, the
//! set of participants currently processing, and the time of the last
//! mutation. It enforces its own structural invariants (a participant is in at
//! most one of the two collections, never twice) but carries no admission
//! policy. Callers serialize access to it; it is not internally synchronized.

use crate::types::{ParticipantId, ProcessingEntry, QueueToken, WaitingEntry};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// Queue state for one protected resource.
#[derive(Debug, Clone)]
pub struct ResourceQueueState {
    waiting: VecDeque<WaitingEntry>,
    processing: HashMap<ParticipantId, ProcessingEntry>,
    last_activity_at: DateTime<Utc>,
}

impl ResourceQueueState {
    /// Create an empty state whose last activity is `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            waiting: VecDeque::new(),
            processing: HashMap::new(),
            last_activity_at: now,
        }
    }

    /// Waiting entries in arrival order.
    pub fn waiting(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.waiting.iter()
    }

    /// Processing entries in no particular order.
    pub fn processing(&self) -> impl Iterator<Item = &ProcessingEntry> {
        self.processing.values()
    }

    /// Waiting-list length.
    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Number of processing participants.
    #[must_use]
    pub fn processing_len(&self) -> usize {
        self.processing.len()
    }

    /// Time of the last mutation.
    #[must_use]
    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Record a mutation at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Whether the participant is waiting or processing.
    #[must_use]
    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.processing.contains_key(participant_id)
            || self.waiting_index_of(participant_id).is_some()
    }

    /// 0-based waiting index of a participant.
    #[must_use]
    pub fn waiting_index_of(&self, participant_id: &ParticipantId) -> Option<usize> {
        self.waiting
            .iter()
            .position(|e| &e.participant_id == participant_id)
    }

    /// 0-based waiting index of the entry holding `token`.
    #[must_use]
    pub fn waiting_index_of_token(&self, token: &QueueToken) -> Option<usize> {
        self.waiting.iter().position(|e| &e.queue_token == token)
    }

    /// 0-based index of the first waiting entry matching `predicate`.
    pub fn waiting_index_where<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&WaitingEntry) -> bool,
    {
        self.waiting.iter().position(predicate)
    }

    /// Waiting entry at a 0-based index.
    #[must_use]
    pub fn waiting_at(&self, index: usize) -> Option<&WaitingEntry> {
        self.waiting.get(index)
    }

    /// Processing entry for a participant.
    #[must_use]
    pub fn processing_entry(&self, participant_id: &ParticipantId) -> Option<&ProcessingEntry> {
        self.processing.get(participant_id)
    }

    /// Mutable processing entry for a participant.
    pub fn processing_entry_mut(
        &mut self,
        participant_id: &ParticipantId,
    ) -> Option<&mut ProcessingEntry> {
        self.processing.get_mut(participant_id)
    }

    /// Participant id of the first processing entry matching `predicate`.
    pub fn processing_id_where<P>(&self, mut predicate: P) -> Option<ParticipantId>
    where
        P: FnMut(&ProcessingEntry) -> bool,
    {
        self.processing
            .values()
            .find(|e| predicate(e))
            .map(|e| e.participant_id.clone())
    }

    /// Append an entry to the tail of the waiting list.
    ///
    /// Returns the new 1-based position, or `None` (leaving the state
    /// untouched) if the participant is already queued.
    pub fn push_waiting(&mut self, entry: WaitingEntry) -> Option<usize> {
        if self.contains(&entry.participant_id) {
            return None;
        }
        self.waiting.push_back(entry);
        Some(self.waiting.len())
    }

    /// Remove and return the head of the waiting list.
    pub fn pop_waiting(&mut self) -> Option<WaitingEntry> {
        self.waiting.pop_front()
    }

    /// Insert a processing entry.
    ///
    /// Returns `false` (leaving the state untouched) if the participant is
    /// already queued.
    pub fn insert_processing(&mut self, entry: ProcessingEntry) -> bool {
        if self.contains(&entry.participant_id) {
            return false;
        }
        self.processing.insert(entry.participant_id.clone(), entry);
        true
    }

    /// Remove a processing entry.
    pub fn remove_processing(&mut self, participant_id: &ParticipantId) -> Option<ProcessingEntry> {
        self.processing.remove(participant_id)
    }

    /// Remove every processing entry whose `started_at` is before `cutoff`.
    pub fn drain_processing_started_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Vec<ProcessingEntry> {
        let stale: Vec<ParticipantId> = self
            .processing
            .values()
            .filter(|e| e.started_at < cutoff)
            .map(|e| e.participant_id.clone())
            .collect();

        stale
            .iter()
            .filter_map(|id| self.processing.remove(id))
            .collect()
    }

    /// Whether nothing is waiting or processing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.processing.is_empty()
    }
}
