//! Change scripts: ordered row writes that turn a store into a merge result

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{SyncableRow, TableSnapshot};
use crate::registry::TableKind;

/// One primitive write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
    /// Insert the row, or replace the stored row with the same id
    Upsert { table: TableKind, row: SyncableRow },
}

impl ChangeOp {
    pub const fn table(&self) -> TableKind {
        match self {
            Self::Upsert { table, .. } => *table,
        }
    }

    pub const fn row(&self) -> &SyncableRow {
        match self {
            Self::Upsert { row, .. } => row,
        }
    }
}

/// Ordered sequence of writes, grouped by table in registry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeScript {
    ops: Vec<ChangeOp>,
}

impl ChangeScript {
    pub fn ops(&self) -> &[ChangeOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations targeting one table, in script order
    pub fn ops_for(&self, table: TableKind) -> impl Iterator<Item = &ChangeOp> + '_ {
        self.ops.iter().filter(move |op| op.table() == table)
    }

    /// Tables in the order their first operation appears
    pub fn tables_in_order(&self) -> Vec<TableKind> {
        let mut tables: Vec<TableKind> = Vec::new();
        for op in &self.ops {
            if !tables.contains(&op.table()) {
                tables.push(op.table());
            }
        }
        tables
    }

    /// Count operations that would actually change `target` when replayed.
    ///
    /// A script produced by re-merging an already merged store against the
    /// same server snapshot has zero effective changes.
    pub fn effective_changes(&self, target: &[TableSnapshot]) -> usize {
        let existing: HashMap<(TableKind, &str), &SyncableRow> = target
            .iter()
            .flat_map(|snapshot| {
                snapshot
                    .rows
                    .iter()
                    .map(move |row| ((snapshot.table, row.id.as_str()), row))
            })
            .collect();

        self.ops
            .iter()
            .filter(|op| existing.get(&(op.table(), op.row().id.as_str())) != Some(&op.row()))
            .count()
    }
}

/// Appends operations table by table, refusing to step backwards in the registry.
#[derive(Debug, Default)]
pub(crate) struct ChangeScriptBuilder {
    ops: Vec<ChangeOp>,
    current: Option<TableKind>,
}

impl ChangeScriptBuilder {
    pub(crate) fn begin_table(&mut self, table: TableKind) {
        debug_assert!(
            self.current.is_none_or(|current| current.position() < table.position()),
            "tables must be emitted in registry order"
        );
        self.current = Some(table);
    }

    pub(crate) fn upsert(&mut self, row: SyncableRow) {
        if let Some(table) = self.current {
            self.ops.push(ChangeOp::Upsert { table, row });
        }
    }

    pub(crate) fn finish(self) -> ChangeScript {
        ChangeScript { ops: self.ops }
    }
}
