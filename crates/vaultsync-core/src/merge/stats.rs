//! Merge statistics

use serde::{Deserialize, Serialize};

use crate::registry::TableKind;

/// Row counts for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStatistics {
    pub table: TableKind,
    /// Present on both sides, local row kept
    pub records_from_local: usize,
    /// Present on both sides, server row kept
    pub records_from_server: usize,
    /// Present only locally
    pub records_created_locally: usize,
    /// Present only on the server
    pub records_inserted: usize,
    /// Present on both sides, whether or not the contents differ
    pub conflicts: usize,
}

impl TableStatistics {
    pub(crate) const fn new(table: TableKind) -> Self {
        Self {
            table,
            records_from_local: 0,
            records_from_server: 0,
            records_created_locally: 0,
            records_inserted: 0,
            conflicts: 0,
        }
    }

    /// Number of distinct ids across both sides
    pub const fn union_size(&self) -> usize {
        self.records_created_locally + self.records_inserted + self.conflicts
    }
}

/// Aggregate counts across all tables of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStatistics {
    pub tables_processed: usize,
    pub records_from_local: usize,
    pub records_from_server: usize,
    pub records_created_locally: usize,
    pub records_inserted: usize,
    pub conflicts: usize,
}

impl MergeStatistics {
    pub(crate) fn absorb(&mut self, table: &TableStatistics) {
        self.tables_processed += 1;
        self.records_from_local += table.records_from_local;
        self.records_from_server += table.records_from_server;
        self.records_created_locally += table.records_created_locally;
        self.records_inserted += table.records_inserted;
        self.conflicts += table.conflicts;
    }
}
