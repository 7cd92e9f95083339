//! Table and vault snapshots

use serde::{Deserialize, Serialize};

use super::row::SyncableRow;
use crate::registry::TableKind;

/// All rows of one table kind. Row order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table: TableKind,
    #[serde(default)]
    pub rows: Vec<SyncableRow>,
}

impl TableSnapshot {
    /// Create an empty snapshot for a table
    #[must_use]
    pub const fn empty(table: TableKind) -> Self {
        Self {
            table,
            rows: Vec::new(),
        }
    }

    /// Create a snapshot from a set of rows
    #[must_use]
    pub fn from_rows(table: TableKind, rows: impl IntoIterator<Item = SyncableRow>) -> Self {
        Self {
            table,
            rows: rows.into_iter().collect(),
        }
    }

    /// Find a row by id
    pub fn row(&self, id: &str) -> Option<&SyncableRow> {
        self.rows.iter().find(|row| row.id == id)
    }
}

/// Plaintext content of a vault blob: a version marker and every syncable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub schema_version: String,
    pub tables: Vec<TableSnapshot>,
}

impl VaultSnapshot {
    /// Create a vault with every registry table present and empty
    #[must_use]
    pub fn empty(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            tables: TableKind::ALL.into_iter().map(TableSnapshot::empty).collect(),
        }
    }

    /// Find the snapshot for a table
    pub fn table(&self, table: TableKind) -> Option<&TableSnapshot> {
        self.tables.iter().find(|snapshot| snapshot.table == table)
    }

    /// Mutable access to the snapshot for a table
    pub fn table_mut(&mut self, table: TableKind) -> Option<&mut TableSnapshot> {
        self.tables.iter_mut().find(|snapshot| snapshot.table == table)
    }

    /// Total number of rows across tables, tombstones included
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|snapshot| snapshot.rows.len()).sum()
    }
}
