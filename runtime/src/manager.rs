//! Queue Manager: admission, position lookup, promotion and completion.
//!
//! Every operation takes the resource's lock, applies its change atomically,
//! releases the lock and only then publishes the change notification. No
//! operation waits for admission: callers get their current status back
//! immediately and poll (or subscribe) for changes.
//!
//! # Lifecycle of a participant
//!
//! ```text
//! join ──> waiting ──promote_next / sweep──> processing ──complete──> gone
//!                                                 │
//!                                                 └──stale past timeout──> reclaimed
//! ```

use crate::health::HealthCheck;
use crate::metrics::QueueMetrics;
use crate::notifier::ChangeNotifier;
use crate::store::{QueueStore, lock_state};
use chrono::TimeDelta;
use std::sync::Arc;
use tracing::{debug, info};
use turnstile_core::environment::Clock;
use turnstile_core::{
    ChangeKind, ContactInfo, DateTime, JoinOutcome, ParticipantId, Placement, PositionReport,
    ProcessingEntry, QueueConfig, QueuePublisher, QueueStatus, QueueToken, ResourceId,
    ResourceQueueState, Utc, WaitingEntry,
};

/// Outcome of one timeout sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Resources that had at least one stale slot
    pub resources: usize,
    /// Stale processing entries removed
    pub reclaimed: usize,
    /// Waiting participants promoted into reclaimed slots
    pub promoted: usize,
}

/// Outcome of one idle reap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Resources whose state was discarded
    pub removed: Vec<ResourceId>,
}

/// How an existing entry is recognized on join.
enum Identity<'a> {
    /// Authenticated caller
    Participant(&'a ParticipantId),
    /// Anonymous caller, matched on contact email
    Contact(&'a ContactInfo),
}

/// The admission queue.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct QueueManager {
    store: QueueStore,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
    config: QueueConfig,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("resources", &self.store.len())
            .field("notifier", &self.notifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QueueManager {
    /// Create a queue manager.
    ///
    /// # Arguments
    ///
    /// - `config`: Timeouts, intervals and topic naming
    /// - `clock`: Source of every timestamp
    /// - `publisher`: Transport for change notifications
    #[must_use]
    pub fn new(
        config: QueueConfig,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn QueuePublisher>,
    ) -> Self {
        let notifier = ChangeNotifier::new(
            publisher,
            config.topic_prefix.clone(),
            config.publish_timeout,
        );
        Self {
            store: QueueStore::new(),
            clock,
            notifier,
            config,
        }
    }

    /// Queue configuration.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Change notifier.
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Admit a participant to a resource's queue.
    ///
    /// - Already waiting: the existing position is returned unchanged.
    /// - Already processing: the slot's timestamp is refreshed (heartbeat).
    /// - Otherwise: appended to the tail with a fresh queue token.
    ///
    /// Anonymous callers (`participant_id == None`) are recognized by contact
    /// email and otherwise keyed by the queue token minted for them.
    pub async fn join(
        &self,
        resource_id: &ResourceId,
        participant_id: Option<ParticipantId>,
        contact: ContactInfo,
    ) -> JoinOutcome {
        let now = self.clock.now();
        let handle = self.store.get_or_create(resource_id, now);
        QueueMetrics::set_active_resources(self.store.len());

        let (outcome, notification) = {
            let mut state = lock_state(&handle);
            let identity = participant_id
                .as_ref()
                .map_or(Identity::Contact(&contact), Identity::Participant);

            if let Some(outcome) = Self::existing_waiting(&state, &identity) {
                QueueMetrics::record_join("already_waiting");
                debug!(
                    resource_id = %resource_id,
                    participant_id = %outcome.participant_id,
                    position = outcome.position,
                    "Participant already waiting"
                );
                (outcome, None)
            } else if let Some(outcome) = Self::heartbeat(&mut state, &identity, now) {
                QueueMetrics::record_join("heartbeat");
                debug!(
                    resource_id = %resource_id,
                    participant_id = %outcome.participant_id,
                    "Processing participant re-joined, slot refreshed"
                );
                (outcome, None)
            } else {
                let queue_token = QueueToken::generate();
                let participant_id =
                    participant_id.unwrap_or_else(|| ParticipantId::from(queue_token.clone()));
                let entry = WaitingEntry {
                    participant_id: participant_id.clone(),
                    queue_token: queue_token.clone(),
                    contact,
                    joined_at: now,
                };
                let position = state
                    .push_waiting(entry)
                    .unwrap_or_else(|| state.waiting_len());
                state.touch(now);

                QueueMetrics::record_join("appended");
                debug!(
                    resource_id = %resource_id,
                    participant_id = %participant_id,
                    position,
                    "Participant joined queue"
                );

                let outcome = JoinOutcome {
                    queue_token,
                    participant_id,
                    position,
                    total: state.waiting_len(),
                    is_processing: false,
                };
                let notification =
                    ChangeNotifier::summarize(resource_id, &state, ChangeKind::Joined, now);
                (outcome, Some(notification))
            }
        };

        if let Some(notification) = notification {
            self.notifier.notify(notification).await;
        }

        outcome
    }

    /// Look up where an identifier sits in a resource's queue.
    ///
    /// `identifier` may be a participant id or a queue token. A processing
    /// participant's slot is refreshed (heartbeat). Unknown identifiers and
    /// unknown resources yield [`Placement::NotInQueue`].
    #[must_use]
    pub fn position(&self, resource_id: &ResourceId, identifier: &str) -> PositionReport {
        let Some(handle) = self.store.get(resource_id) else {
            return PositionReport::not_in_queue(0);
        };
        let now = self.clock.now();
        let mut state = lock_state(&handle);
        let total = state.waiting_len();

        let processing_id = state.processing_id_where(|e| {
            e.participant_id.as_str() == identifier || e.queue_token.as_str() == identifier
        });
        if let Some(id) = processing_id {
            let queue_token = state.processing_entry_mut(&id).map(|entry| {
                entry.started_at = now;
                entry.queue_token.clone()
            });
            state.touch(now);
            return PositionReport {
                placement: Placement::Processing,
                total,
                queue_token,
            };
        }

        let index = state.waiting_index_where(|e| {
            e.participant_id.as_str() == identifier || e.queue_token.as_str() == identifier
        });
        match index.and_then(|i| state.waiting_at(i).map(|e| (i, e))) {
            Some((i, entry)) => PositionReport {
                placement: Placement::Waiting(i + 1),
                total,
                queue_token: Some(entry.queue_token.clone()),
            },
            None => PositionReport::not_in_queue(total),
        }
    }

    /// Move the head of the waiting list into the processing slot.
    ///
    /// Returns `None` without blocking when nobody is waiting or the resource
    /// has no state.
    pub async fn promote_next(&self, resource_id: &ResourceId) -> Option<ProcessingEntry> {
        let handle = self.store.get(resource_id)?;
        let now = self.clock.now();

        let (promoted, notification) = {
            let mut state = lock_state(&handle);
            let promoted = Self::promote_head(&mut state, now, "manual")?;
            state.touch(now);
            let notification =
                ChangeNotifier::summarize(resource_id, &state, ChangeKind::Promoted, now);
            (promoted, notification)
        };

        info!(
            resource_id = %resource_id,
            participant_id = %promoted.participant_id,
            "Participant promoted to processing"
        );
        self.notifier.notify(notification).await;

        Some(promoted)
    }

    /// Release a participant's processing slot.
    ///
    /// Returns whether an entry was removed; `false` is a no-op signal, not an
    /// error.
    pub async fn complete(&self, resource_id: &ResourceId, participant_id: &ParticipantId) -> bool {
        let Some(handle) = self.store.get(resource_id) else {
            return false;
        };
        let now = self.clock.now();

        let notification = {
            let mut state = lock_state(&handle);
            if state.remove_processing(participant_id).is_none() {
                debug!(
                    resource_id = %resource_id,
                    participant_id = %participant_id,
                    "Complete ignored, participant not processing"
                );
                return false;
            }
            state.touch(now);
            ChangeNotifier::summarize(resource_id, &state, ChangeKind::Completed, now)
        };

        QueueMetrics::record_completion();
        info!(
            resource_id = %resource_id,
            participant_id = %participant_id,
            "Participant completed processing"
        );
        self.notifier.notify(notification).await;

        true
    }

    /// Snapshot of a resource's queue for operators.
    #[must_use]
    pub fn status(&self, resource_id: &ResourceId) -> QueueStatus {
        let Some(handle) = self.store.get(resource_id) else {
            return QueueStatus {
                waiting_count: 0,
                processing_ids: Vec::new(),
                total: 0,
            };
        };
        let state = lock_state(&handle);

        let mut processing: Vec<&ProcessingEntry> = state.processing().collect();
        processing.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });

        QueueStatus {
            waiting_count: state.waiting_len(),
            processing_ids: processing
                .into_iter()
                .map(|e| e.participant_id.clone())
                .collect(),
            total: state.waiting_len() + state.processing_len(),
        }
    }

    /// Reclaim processing slots held past the processing timeout.
    ///
    /// Each reclaimed slot is handed to the next waiting participant, if any.
    /// Resources are handled one at a time; each is locked only while its own
    /// slots are examined.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let Some(cutoff) = TimeDelta::from_std(self.config.processing_timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout))
        else {
            return report;
        };

        for resource_id in self.store.resource_ids() {
            // Reaped since the id list was taken
            let Some(handle) = self.store.get(&resource_id) else {
                continue;
            };

            let notification = {
                let mut state = lock_state(&handle);
                let stale = state.drain_processing_started_before(cutoff);
                if stale.is_empty() {
                    continue;
                }

                for entry in &stale {
                    info!(
                        resource_id = %resource_id,
                        participant_id = %entry.participant_id,
                        started_at = %entry.started_at,
                        "Reclaimed stale processing slot"
                    );
                }

                let promoted = (0..stale.len())
                    .map_while(|_| Self::promote_head(&mut state, now, "reclaim"))
                    .count();
                state.touch(now);

                report.resources += 1;
                report.reclaimed += stale.len();
                report.promoted += promoted;
                QueueMetrics::record_reclaims(stale.len());

                ChangeNotifier::summarize(&resource_id, &state, ChangeKind::Reclaimed, now)
            };

            self.notifier.notify(notification).await;
        }

        report
    }

    /// Discard the state of every resource idle for longer than the idle window.
    ///
    /// Residual waiting and processing entries are dropped with the state.
    pub fn reap(&self) -> ReapReport {
        let now = self.clock.now();
        let Ok(window) = TimeDelta::from_std(self.config.idle_window) else {
            return ReapReport::default();
        };

        let removed = self.store.remove_where(|resource_id, state| {
            let idle = now.signed_duration_since(state.last_activity_at()) > window;
            if idle {
                info!(
                    resource_id = %resource_id,
                    waiting = state.waiting_len(),
                    processing = state.processing_len(),
                    last_activity_at = %state.last_activity_at(),
                    "Discarding idle queue state"
                );
            }
            idle
        });

        for resource_id in &removed {
            QueueMetrics::set_waiting(resource_id, 0);
        }
        QueueMetrics::record_reaped(removed.len());
        QueueMetrics::set_active_resources(self.store.len());

        ReapReport { removed }
    }

    /// Number of resources with queue state.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.store.len()
    }

    /// Whether a resource currently has queue state.
    #[must_use]
    pub fn has_resource(&self, resource_id: &ResourceId) -> bool {
        self.store.contains(resource_id)
    }

    /// Health of the queue.
    ///
    /// Degraded while the notification transport keeps failing; queue
    /// operations themselves are unaffected.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let (mut waiting, mut processing) = (0, 0);
        for resource_id in self.store.resource_ids() {
            if let Some(handle) = self.store.get(&resource_id) {
                let state = lock_state(&handle);
                waiting += state.waiting_len();
                processing += state.processing_len();
            }
        }

        let failures = self.notifier.consecutive_failures();
        let check = if failures == 0 {
            HealthCheck::healthy("admission_queue")
        } else {
            HealthCheck::degraded(
                "admission_queue",
                format!("{failures} consecutive notification failures"),
            )
        };

        check
            .with_metadata("resources", self.store.len().to_string())
            .with_metadata("waiting", waiting.to_string())
            .with_metadata("processing", processing.to_string())
    }

    fn existing_waiting(state: &ResourceQueueState, identity: &Identity<'_>) -> Option<JoinOutcome> {
        let index = match identity {
            Identity::Participant(id) => state.waiting_index_of(id),
            Identity::Contact(contact) => state.waiting_index_where(|e| e.contact.same_email(contact)),
        }?;
        let entry = state.waiting_at(index)?;

        Some(JoinOutcome {
            queue_token: entry.queue_token.clone(),
            participant_id: entry.participant_id.clone(),
            position: index + 1,
            total: state.waiting_len(),
            is_processing: false,
        })
    }

    fn heartbeat(
        state: &mut ResourceQueueState,
        identity: &Identity<'_>,
        now: DateTime<Utc>,
    ) -> Option<JoinOutcome> {
        let id = match identity {
            Identity::Participant(id) => state
                .processing_entry(id)
                .map(|e| e.participant_id.clone()),
            Identity::Contact(contact) => {
                state.processing_id_where(|e| e.contact.same_email(contact))
            }
        }?;
        let total = state.waiting_len();
        let entry = state.processing_entry_mut(&id)?;
        entry.started_at = now;
        let outcome = JoinOutcome {
            queue_token: entry.queue_token.clone(),
            participant_id: entry.participant_id.clone(),
            position: 0,
            total,
            is_processing: true,
        };
        state.touch(now);

        Some(outcome)
    }

    fn promote_head(
        state: &mut ResourceQueueState,
        now: DateTime<Utc>,
        trigger: &'static str,
    ) -> Option<ProcessingEntry> {
        let head = state.pop_waiting()?;
        let waited = now
            .signed_duration_since(head.joined_at)
            .to_std()
            .unwrap_or_default();
        let entry = ProcessingEntry::admit(head, now);
        let inserted = state.insert_processing(entry.clone());
        debug_assert!(inserted, "a waiting participant cannot already be processing");

        QueueMetrics::record_promotion(trigger, waited);
        Some(entry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use std::time::Duration;
    use turnstile_testing::helpers::{contact, contact_with_email, event, participant};
    use turnstile_testing::{FailingPublisher, FixedClock, RecordingPublisher, test_clock};

    fn manager_with(clock: &FixedClock, publisher: &RecordingPublisher) -> QueueManager {
        QueueManager::new(QueueConfig::default(), clock.shared(), publisher.shared())
    }

    #[tokio::test]
    async fn test_join_appends_in_arrival_order() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        let a = manager.join(&e1, Some(participant("a")), contact("a")).await;
        let b = manager.join(&e1, Some(participant("b")), contact("b")).await;

        assert_eq!((a.position, a.total), (1, 1));
        assert_eq!((b.position, b.total), (2, 2));
        assert!(!a.is_processing);
        assert_ne!(a.queue_token, b.queue_token);
    }

    #[tokio::test]
    async fn test_rejoin_while_waiting_is_idempotent() {
        let clock = test_clock();
        let publisher = RecordingPublisher::new();
        let manager = manager_with(&clock, &publisher);
        let e1 = event("E1");

        let first = manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.join(&e1, Some(participant("b")), contact("b")).await;
        let again = manager.join(&e1, Some(participant("a")), contact("a")).await;

        assert_eq!(again.position, 1);
        assert_eq!(again.total, 2);
        assert_eq!(again.queue_token, first.queue_token);
        // Only the two real appends were announced
        assert_eq!(publisher.count(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_join_gets_token_as_identity() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());

        let outcome = manager.join(&event("E1"), None, contact("anon")).await;

        assert_eq!(outcome.participant_id.as_str(), outcome.queue_token.as_str());
        let report = manager.position(&event("E1"), outcome.queue_token.as_str());
        assert_eq!(report.placement, Placement::Waiting(1));
    }

    #[tokio::test]
    async fn test_anonymous_rejoin_matches_on_email() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        let first = manager
            .join(&e1, None, contact_with_email("Ada", "ada@example.com"))
            .await;
        let again = manager
            .join(&e1, None, contact_with_email("Ada L.", "ADA@example.com"))
            .await;

        assert_eq!(again.queue_token, first.queue_token);
        assert_eq!(again.total, 1);
    }

    #[tokio::test]
    async fn test_anonymous_rejoin_while_processing_is_heartbeat() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        let first = manager
            .join(&e1, None, contact_with_email("Ada", "ada@example.com"))
            .await;
        manager.promote_next(&e1).await.unwrap();

        clock.advance(Duration::from_secs(30));
        let again = manager
            .join(&e1, None, contact_with_email("Ada", "Ada@Example.COM"))
            .await;

        assert!(again.is_processing);
        assert_eq!(again.position, 0);
        assert_eq!(again.queue_token, first.queue_token);
        assert_eq!(again.participant_id, first.participant_id);

        // 75s after promotion but only 45s after the heartbeat
        clock.advance(Duration::from_secs(45));
        let report = manager.sweep().await;
        assert_eq!(report.reclaimed, 0);
        assert!(manager.position(&e1, first.queue_token.as_str()).is_processing());
    }

    #[tokio::test]
    async fn test_anonymous_without_email_always_appends() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        manager.join(&e1, None, contact("anon")).await;
        let second = manager.join(&e1, None, contact("anon")).await;

        assert_eq!(second.position, 2);
    }

    #[tokio::test]
    async fn test_join_while_processing_is_heartbeat() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        let promoted = manager.promote_next(&e1).await.unwrap();

        clock.advance(Duration::from_secs(30));
        let outcome = manager.join(&e1, Some(participant("a")), contact("a")).await;

        assert!(outcome.is_processing);
        assert_eq!(outcome.position, 0);
        assert_eq!(outcome.queue_token, promoted.queue_token);

        // Refreshed slot survives a sweep that the original start time would not
        clock.advance(Duration::from_secs(45));
        let report = manager.sweep().await;
        assert_eq!(report.reclaimed, 0);
    }

    #[tokio::test]
    async fn test_promote_next_is_fifo() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.join(&e1, Some(participant("b")), contact("b")).await;

        let promoted = manager.promote_next(&e1).await.unwrap();
        assert_eq!(promoted.participant_id, participant("a"));
        assert_eq!(promoted.started_at, clock.now());

        let a = manager.position(&e1, "a");
        assert_eq!(a.position(), 0);
        assert!(a.is_processing());

        let b = manager.position(&e1, "b");
        assert_eq!(b.position(), 1);
        assert_eq!(b.total, 1);
    }

    #[tokio::test]
    async fn test_promote_next_on_empty_queue() {
        let clock = test_clock();
        let publisher = RecordingPublisher::new();
        let manager = manager_with(&clock, &publisher);

        assert!(manager.promote_next(&event("E1")).await.is_none());
        assert!(!manager.has_resource(&event("E1")));

        manager.join(&event("E1"), Some(participant("a")), contact("a")).await;
        manager.promote_next(&event("E1")).await;
        publisher.clear();

        assert!(manager.promote_next(&event("E1")).await.is_none());
        assert_eq!(publisher.count(), 0);
    }

    #[tokio::test]
    async fn test_complete_removes_participant() {
        let clock = test_clock();
        let publisher = RecordingPublisher::new();
        let manager = manager_with(&clock, &publisher);
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.promote_next(&e1).await;

        assert!(manager.complete(&e1, &participant("a")).await);
        assert_eq!(manager.position(&e1, "a").placement, Placement::NotInQueue);
        assert_eq!(publisher.last().unwrap().1.change, ChangeKind::Completed);

        assert!(!manager.complete(&e1, &participant("a")).await);
        assert!(!manager.complete(&event("E2"), &participant("a")).await);
    }

    #[tokio::test]
    async fn test_complete_ignores_waiting_participant() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;

        assert!(!manager.complete(&e1, &participant("a")).await);
        assert_eq!(manager.position(&e1, "a").placement, Placement::Waiting(1));
    }

    #[tokio::test]
    async fn test_position_not_in_queue() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        let unknown_resource = manager.position(&e1, "a");
        assert_eq!(unknown_resource.position(), -1);
        assert_eq!(unknown_resource.total, 0);
        assert!(!manager.has_resource(&e1));

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        let unknown_participant = manager.position(&e1, "zed");
        assert_eq!(unknown_participant.position(), -1);
        assert_eq!(unknown_participant.total, 1);
        assert!(unknown_participant.queue_token.is_none());
    }

    #[tokio::test]
    async fn test_position_by_token_for_processing_participant() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        let joined = manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.promote_next(&e1).await;

        let report = manager.position(&e1, joined.queue_token.as_str());
        assert!(report.is_processing());
        assert_eq!(report.queue_token, Some(joined.queue_token));
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        for id in ["a", "b", "c"] {
            manager.join(&e1, Some(participant(id)), contact(id)).await;
        }
        manager.promote_next(&e1).await;
        clock.advance(Duration::from_secs(1));
        manager.promote_next(&e1).await;

        let status = manager.status(&e1);
        assert_eq!(status.waiting_count, 1);
        assert_eq!(status.processing_ids, vec![participant("a"), participant("b")]);
        assert_eq!(status.total, 3);

        let empty = manager.status(&event("E9"));
        assert_eq!(empty.total, 0);
    }

    #[tokio::test]
    async fn test_notifications_carry_counts() {
        let clock = test_clock();
        let publisher = RecordingPublisher::new();
        let manager = manager_with(&clock, &publisher);
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.join(&e1, Some(participant("b")), contact("b")).await;
        manager.promote_next(&e1).await;

        let published = publisher.published();
        let changes: Vec<_> = published.iter().map(|(_, n)| (n.change, n.waiting_count)).collect();
        assert_eq!(
            changes,
            vec![
                (ChangeKind::Joined, 1),
                (ChangeKind::Joined, 2),
                (ChangeKind::Promoted, 1),
            ]
        );
        assert!(published.iter().all(|(topic, _)| topic == "queue:E1"));
    }

    #[tokio::test]
    async fn test_failed_transport_never_fails_operations() {
        let clock = test_clock();
        let manager = QueueManager::new(
            QueueConfig::default(),
            clock.shared(),
            Arc::new(FailingPublisher),
        );
        let e1 = event("E1");

        let joined = manager.join(&e1, Some(participant("a")), contact("a")).await;
        assert_eq!(joined.position, 1);
        assert!(manager.promote_next(&e1).await.is_some());
        assert!(manager.complete(&e1, &participant("a")).await);

        let health = manager.health();
        assert!(health.status.is_degraded());
    }

    #[tokio::test]
    async fn test_resources_are_independent() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());

        manager.join(&event("E1"), Some(participant("a")), contact("a")).await;
        let other = manager.join(&event("E2"), Some(participant("a")), contact("a")).await;

        assert_eq!(other.position, 1);
        assert_eq!(manager.resource_count(), 2);
    }

    #[tokio::test]
    async fn test_health_counts() {
        let clock = test_clock();
        let manager = manager_with(&clock, &RecordingPublisher::new());
        let e1 = event("E1");

        manager.join(&e1, Some(participant("a")), contact("a")).await;
        manager.join(&e1, Some(participant("b")), contact("b")).await;
        manager.promote_next(&e1).await;

        let health = manager.health();
        assert!(health.status.is_healthy());
        assert_eq!(health.metadata_value("waiting"), Some("1"));
        assert_eq!(health.metadata_value("processing"), Some("1"));
    }
}
