//! Per-vault sync bookkeeping

use serde::{Deserialize, Serialize};

/// Sync bookkeeping for one local vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Local mutations not yet reflected on the server
    pub is_dirty: bool,
    /// Incremented once per local write transaction
    pub mutation_sequence: u64,
    /// Last server revision this client observed
    pub server_revision: i64,
    /// A sync attempt is in flight (never persisted)
    #[serde(skip)]
    pub is_syncing: bool,
    /// Sync attempts are suspended
    pub is_offline: bool,
}

impl SyncState {
    /// State after one local write transaction.
    #[must_use]
    pub const fn with_mutation(mut self) -> Self {
        self.mutation_sequence = self.mutation_sequence.saturating_add(1);
        self.is_dirty = true;
        self
    }

    /// State after a successful upload or merge push.
    ///
    /// The vault stays dirty when a local write landed after `seq_at_start`
    /// was recorded; the new revision is stored either way.
    #[must_use]
    pub const fn after_push(mut self, seq_at_start: u64, revision: i64) -> Self {
        self.server_revision = revision;
        self.is_dirty = self.mutation_sequence != seq_at_start;
        self
    }

    /// State after the local vault was replaced by the server copy.
    #[must_use]
    pub const fn after_download(mut self, revision: i64) -> Self {
        self.server_revision = revision;
        self.is_dirty = false;
        self
    }

    #[must_use]
    pub const fn with_offline(mut self, is_offline: bool) -> Self {
        self.is_offline = is_offline;
        self
    }
}
