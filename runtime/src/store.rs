//! Concurrent map of per-resource queue state.
//!
//! The map itself sits behind a read-write lock that is only held long enough
//! to look up, insert or remove a handle. Each resource's
//! [`ResourceQueueState`] sits behind its own mutex, so mutations on the same
//! resource are serialized while different resources never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use turnstile_core::{DateTime, ResourceId, ResourceQueueState, Utc};

/// Shared, lock-protected handle to one resource's state.
pub type StateHandle = Arc<Mutex<ResourceQueueState>>;

/// Lock a resource's state.
///
/// A poisoned lock is recovered: every mutation leaves the state valid before
/// anything that could panic runs, so the data behind a poisoned lock is sound.
pub fn lock_state(handle: &StateHandle) -> MutexGuard<'_, ResourceQueueState> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue State Store: resource id → lock-protected state.
#[derive(Debug, Default)]
pub struct QueueStore {
    resources: RwLock<HashMap<ResourceId, StateHandle>>,
}

impl QueueStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a resource, if it has state.
    #[must_use]
    pub fn get(&self, resource_id: &ResourceId) -> Option<StateHandle> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource_id)
            .cloned()
    }

    /// Handle for a resource, creating empty state stamped `now` on first use.
    pub fn get_or_create(&self, resource_id: &ResourceId, now: DateTime<Utc>) -> StateHandle {
        if let Some(handle) = self.get(resource_id) {
            return handle;
        }

        let mut resources = self
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have created it between the two locks
        Arc::clone(resources.entry(resource_id.clone()).or_insert_with(|| {
            tracing::debug!(resource_id = %resource_id, "Created queue state");
            Arc::new(Mutex::new(ResourceQueueState::new(now)))
        }))
    }

    /// Whether a resource has state.
    #[must_use]
    pub fn contains(&self, resource_id: &ResourceId) -> bool {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(resource_id)
    }

    /// Ids of every resource with state, sorted.
    #[must_use]
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of resources with state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no resource has state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every resource whose state matches `predicate`.
    ///
    /// Resources whose handle is checked out by an in-flight operation are
    /// skipped: new handles can only be taken through the map, so holding the
    /// write lock and the last reference means nobody can be mid-mutation.
    pub fn remove_where<F>(&self, mut predicate: F) -> Vec<ResourceId>
    where
        F: FnMut(&ResourceId, &ResourceQueueState) -> bool,
    {
        let mut resources = self
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let doomed: Vec<ResourceId> = resources
            .iter()
            .filter(|(id, handle)| {
                Arc::strong_count(handle) == 1 && predicate(id, &lock_state(handle))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            resources.remove(id);
        }

        doomed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use turnstile_testing::helpers::event;
    use turnstile_testing::test_clock;
    use turnstile_core::environment::Clock;

    #[test]
    fn test_get_or_create_returns_same_handle() {
        let store = QueueStore::new();
        let now = test_clock().now();

        let a = store.get_or_create(&event("E1"), now);
        let b = store.get_or_create(&event("E1"), now);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let store = QueueStore::new();
        assert!(store.get(&event("E1")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_resource_ids_sorted() {
        let store = QueueStore::new();
        let now = test_clock().now();
        store.get_or_create(&event("E2"), now);
        store.get_or_create(&event("E1"), now);

        assert_eq!(store.resource_ids(), vec![event("E1"), event("E2")]);
    }

    #[test]
    fn test_remove_where_skips_checked_out_handles() {
        let store = QueueStore::new();
        let now = test_clock().now();
        let held = store.get_or_create(&event("E1"), now);
        let _ = store.get_or_create(&event("E2"), now);

        let removed = store.remove_where(|_, _| true);

        assert_eq!(removed, vec![event("E2")]);
        assert!(store.contains(&event("E1")));
        drop(held);

        let removed = store.remove_where(|_, _| true);
        assert_eq!(removed, vec![event("E1")]);
        assert!(store.is_empty());
    }
}
