//! Syncable row model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Column name to value map carried by a row. Opaque to the sync engine.
pub type Columns = BTreeMap<String, Value>;

/// Generate a new row id (UUID v7, time-sortable)
#[must_use]
pub fn new_row_id() -> String {
    Uuid::now_v7().to_string()
}

/// One row of one syncable table.
///
/// `id` and `updated_at` are the only fields the merge engine interprets.
/// Both default when absent so that malformed rows in a vault document
/// reach the merge engine and are rejected there with a precise error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncableRow {
    /// Stable identifier, immutable for the row's lifetime
    #[serde(default)]
    pub id: String,
    /// Last mutation timestamp (Unix ms), stamped by the writer
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Soft delete flag; a delete is an ordinary mutation
    #[serde(default)]
    pub is_deleted: bool,
    /// Table-specific payload
    #[serde(default)]
    pub columns: Columns,
}

impl SyncableRow {
    /// Create a live row with the given id and timestamp
    #[must_use]
    pub fn new(id: impl Into<String>, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            updated_at: Some(updated_at),
            is_deleted: false,
            columns: Columns::new(),
        }
    }

    /// Set a payload column
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    /// Mark the row as a tombstone
    #[must_use]
    pub const fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// Read a column as a string reference, if present and textual
    pub fn column_str(&self, name: &str) -> Option<&str> {
        self.columns.get(name).and_then(Value::as_str)
    }

    /// Whether the row carries a usable id
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}
