//! Shared in-memory sync state with a scoped in-flight flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::SyncState;

/// Shared handle to one vault's `SyncState`.
///
/// Persisted fields are written by `VaultService` while it holds the store
/// lock; `is_syncing` is owned by `SyncGuard`.
#[derive(Debug, Clone, Default)]
pub struct SyncStateTracker {
    inner: Arc<Mutex<SyncState>>,
}

impl SyncStateTracker {
    pub fn new(initial: SyncState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SyncState {
                is_syncing: false,
                ..initial
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        // State is plain data; a panic elsewhere cannot leave it half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SyncState {
        *self.lock()
    }

    pub fn is_syncing(&self) -> bool {
        self.lock().is_syncing
    }

    /// Claim the single sync slot. Returns `None` if a sync is already in flight.
    pub fn try_begin(&self) -> Option<SyncGuard> {
        let mut state = self.lock();
        if state.is_syncing {
            return None;
        }
        state.is_syncing = true;
        drop(state);
        Some(SyncGuard {
            tracker: self.clone(),
        })
    }

    /// Store persisted fields, leaving `is_syncing` as it is.
    pub fn commit(&self, next: SyncState) {
        let mut state = self.lock();
        *state = SyncState {
            is_syncing: state.is_syncing,
            ..next
        };
    }
}

/// Releases the sync slot when dropped, on every exit path.
#[derive(Debug)]
#[must_use = "the sync slot is released as soon as the guard is dropped"]
pub struct SyncGuard {
    tracker: SyncStateTracker,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.tracker.lock().is_syncing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_guard_at_a_time() {
        let tracker = SyncStateTracker::default();
        let guard = tracker.try_begin().unwrap();
        assert!(tracker.is_syncing());
        assert!(tracker.try_begin().is_none());

        drop(guard);
        assert!(!tracker.is_syncing());
        assert!(tracker.try_begin().is_some());
    }

    #[test]
    fn new_never_starts_syncing() {
        let tracker = SyncStateTracker::new(SyncState {
            is_syncing: true,
            mutation_sequence: 3,
            ..SyncState::default()
        });
        assert!(!tracker.is_syncing());
        assert_eq!(tracker.snapshot().mutation_sequence, 3);
    }

    #[test]
    fn commit_preserves_in_flight_flag() {
        let tracker = SyncStateTracker::default();
        let _guard = tracker.try_begin().unwrap();
        tracker.commit(SyncState::default().with_mutation());

        let state = tracker.snapshot();
        assert!(state.is_syncing);
        assert!(state.is_dirty);
    }

    #[test]
    fn guard_released_after_panic() {
        let tracker = SyncStateTracker::default();
        let cloned = tracker.clone();
        let result = std::thread::spawn(move || {
            let _guard = cloned.try_begin().unwrap();
            panic!("sync task failed");
        })
        .join();
        assert!(result.is_err());
        assert!(!tracker.is_syncing());
    }
}
