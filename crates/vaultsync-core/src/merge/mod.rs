//! Row-level last-write-wins vault merge.
//!
//! For every table in registry order, rows are matched by id across the local
//! and server snapshots:
//!
//! - a row present on one side only is carried through unchanged;
//! - a row present on both sides is a conflict, and the row with the strictly
//!   greater `updated_at` survives, the server row winning ties.
//!
//! Tombstones (`is_deleted`) are ordinary rows here. Nothing is ever dropped.
//! The merge is pure and deterministic: rows are emitted sorted by id, so the
//! same request always yields the same script and statistics.

mod script;
mod stats;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{SyncableRow, TableSnapshot};
use crate::registry::TableKind;

pub use script::{ChangeOp, ChangeScript};
pub use stats::{MergeStatistics, TableStatistics};

use script::ChangeScriptBuilder;

/// Which input a malformed table or row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Shape errors that make a merge impossible. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("local and server disagree on table set (local: {local:?}, server: {server:?})")]
    TableSetMismatch {
        local: Vec<TableKind>,
        server: Vec<TableKind>,
    },
    #[error("{side} snapshot lists table {table} more than once")]
    DuplicateTable { side: Side, table: TableKind },
    #[error("{side} row in {table} is missing its id")]
    MissingId { side: Side, table: TableKind },
    #[error("{side} row {id} in {table} is missing updated_at")]
    MissingUpdatedAt {
        side: Side,
        table: TableKind,
        id: String,
    },
    #[error("{side} snapshot of {table} contains id {id} more than once")]
    DuplicateRowId {
        side: Side,
        table: TableKind,
        id: String,
    },
}

/// Local and server snapshots covering the same table kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub local: Vec<TableSnapshot>,
    pub server: Vec<TableSnapshot>,
}

impl MergeRequest {
    pub const fn new(local: Vec<TableSnapshot>, server: Vec<TableSnapshot>) -> Self {
        Self { local, server }
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub script: ChangeScript,
    pub stats: MergeStatistics,
    /// Per-table counts, in registry order
    pub tables: Vec<TableStatistics>,
}

/// Merge two vault snapshots.
pub fn merge(request: &MergeRequest) -> Result<MergeOutcome, MergeError> {
    let local = index_tables(Side::Local, &request.local)?;
    let server = index_tables(Side::Server, &request.server)?;

    if local.keys().ne(server.keys()) {
        return Err(MergeError::TableSetMismatch {
            local: local.keys().copied().collect(),
            server: server.keys().copied().collect(),
        });
    }

    let mut builder = ChangeScriptBuilder::default();
    let mut stats = MergeStatistics::default();
    let mut tables = Vec::with_capacity(local.len());

    // BTreeMap iteration follows `TableKind`'s declaration order, which is the registry order.
    for (table, local_snapshot) in &local {
        let server_snapshot = server[table];
        let table_stats = merge_table(*table, local_snapshot, server_snapshot, &mut builder)?;
        tracing::debug!(
            table = %table,
            conflicts = table_stats.conflicts,
            created_locally = table_stats.records_created_locally,
            inserted = table_stats.records_inserted,
            "Merged table"
        );
        stats.absorb(&table_stats);
        tables.push(table_stats);
    }

    Ok(MergeOutcome {
        script: builder.finish(),
        stats,
        tables,
    })
}

/// Check that one side's tables and rows are well formed without merging.
pub fn validate_tables(side: Side, tables: &[TableSnapshot]) -> Result<(), MergeError> {
    for snapshot in index_tables(side, tables)?.values() {
        index_rows(side, snapshot)?;
    }
    Ok(())
}

fn index_tables(
    side: Side,
    snapshots: &[TableSnapshot],
) -> Result<BTreeMap<TableKind, &TableSnapshot>, MergeError> {
    let mut indexed = BTreeMap::new();
    for snapshot in snapshots {
        if indexed.insert(snapshot.table, snapshot).is_some() {
            return Err(MergeError::DuplicateTable {
                side,
                table: snapshot.table,
            });
        }
    }
    Ok(indexed)
}

/// Index rows by id, validating that each carries an id and a timestamp.
fn index_rows(
    side: Side,
    snapshot: &TableSnapshot,
) -> Result<BTreeMap<&str, (&SyncableRow, i64)>, MergeError> {
    let table = snapshot.table;
    let mut indexed = BTreeMap::new();
    for row in &snapshot.rows {
        if !row.has_id() {
            return Err(MergeError::MissingId { side, table });
        }
        let updated_at = row.updated_at.ok_or_else(|| MergeError::MissingUpdatedAt {
            side,
            table,
            id: row.id.clone(),
        })?;
        if indexed
            .insert(row.id.as_str(), (row, updated_at))
            .is_some()
        {
            return Err(MergeError::DuplicateRowId {
                side,
                table,
                id: row.id.clone(),
            });
        }
    }
    Ok(indexed)
}

fn merge_table(
    table: TableKind,
    local: &TableSnapshot,
    server: &TableSnapshot,
    builder: &mut ChangeScriptBuilder,
) -> Result<TableStatistics, MergeError> {
    let local_rows = index_rows(Side::Local, local)?;
    let server_rows = index_rows(Side::Server, server)?;
    let ids: BTreeSet<&str> = local_rows.keys().chain(server_rows.keys()).copied().collect();

    let mut stats = TableStatistics::new(table);
    builder.begin_table(table);

    for id in ids {
        let winner = match (local_rows.get(id), server_rows.get(id)) {
            (Some((row, _)), None) => {
                stats.records_created_locally += 1;
                *row
            }
            (None, Some((row, _))) => {
                stats.records_inserted += 1;
                *row
            }
            (Some((local_row, local_at)), Some((server_row, server_at))) => {
                stats.conflicts += 1;
                if local_at > server_at {
                    stats.records_from_local += 1;
                    *local_row
                } else {
                    stats.records_from_server += 1;
                    *server_row
                }
            }
            (None, None) => continue,
        };
        builder.upsert(winner.clone());
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::VaultSnapshot;

    fn vault(rows: &[(TableKind, SyncableRow)]) -> Vec<TableSnapshot> {
        let mut vault = VaultSnapshot::empty("1.2.0");
        for (table, row) in rows {
            vault.table_mut(*table).unwrap().rows.push(row.clone());
        }
        vault.tables
    }

    fn item(id: &str, updated_at: i64, name: &str) -> (TableKind, SyncableRow) {
        (
            TableKind::Items,
            SyncableRow::new(id, updated_at).with_column("name", name),
        )
    }

    #[test]
    fn local_only_row_is_created_locally() {
        let request = MergeRequest::new(vault(&[item("A1", 10, "local")]), vault(&[]));
        let outcome = merge(&request).unwrap();

        assert_eq!(outcome.stats.records_created_locally, 1);
        assert_eq!(outcome.stats.conflicts, 0);
        assert_eq!(outcome.script.len(), 1);
        assert_eq!(outcome.script.ops()[0].row().id, "A1");
        assert_eq!(outcome.script.ops()[0].table(), TableKind::Items);
    }

    #[test]
    fn newer_server_edit_wins() {
        let request = MergeRequest::new(
            vault(&[item("B1", 100, "local")]),
            vault(&[item("B1", 200, "server")]),
        );
        let outcome = merge(&request).unwrap();

        assert_eq!(outcome.stats.records_from_server, 1);
        assert_eq!(outcome.stats.records_from_local, 0);
        assert_eq!(outcome.stats.conflicts, 1);
        assert_eq!(outcome.script.ops()[0].row().column_str("name"), Some("server"));
    }

    #[test]
    fn newer_local_edit_wins() {
        let request = MergeRequest::new(
            vault(&[item("B1", 300, "local")]),
            vault(&[item("B1", 200, "server")]),
        );
        let outcome = merge(&request).unwrap();

        assert_eq!(outcome.stats.records_from_local, 1);
        assert_eq!(outcome.script.ops()[0].row().column_str("name"), Some("local"));
    }

    #[test]
    fn tie_goes_to_server() {
        let request = MergeRequest::new(
            vault(&[item("C1", 500, "local")]),
            vault(&[item("C1", 500, "server")]),
        );
        let outcome = merge(&request).unwrap();

        assert_eq!(outcome.stats.records_from_server, 1);
        assert_eq!(outcome.script.ops()[0].row().column_str("name"), Some("server"));
    }

    #[test]
    fn identical_rows_still_count_as_conflicts() {
        let request = MergeRequest::new(
            vault(&[item("D1", 5, "same")]),
            vault(&[item("D1", 5, "same")]),
        );
        let outcome = merge(&request).unwrap();
        assert_eq!(outcome.stats.conflicts, 1);
    }

    #[test]
    fn newer_tombstone_survives() {
        let deleted = SyncableRow::new("E1", 900).deleted();
        let request = MergeRequest::new(
            vault(&[(TableKind::Items, deleted)]),
            vault(&[item("E1", 800, "server")]),
        );
        let outcome = merge(&request).unwrap();

        assert!(outcome.script.ops()[0].row().is_deleted);
        assert_eq!(outcome.stats.records_from_local, 1);
    }

    #[test]
    fn server_only_rows_are_pulled_and_nothing_is_dropped() {
        let request = MergeRequest::new(
            vault(&[item("L1", 1, "l")]),
            vault(&[item("S1", 1, "s"), item("S2", 1, "s")]),
        );
        let outcome = merge(&request).unwrap();

        assert_eq!(outcome.stats.records_inserted, 2);
        assert_eq!(outcome.stats.records_created_locally, 1);
        assert_eq!(outcome.script.len(), 3);
    }

    #[test]
    fn every_table_is_processed_even_when_empty() {
        let outcome = merge(&MergeRequest::new(vault(&[]), vault(&[]))).unwrap();
        assert_eq!(outcome.stats.tables_processed, TableKind::ALL.len());
        assert!(outcome.script.is_empty());
        assert_eq!(outcome.tables.len(), TableKind::ALL.len());
    }

    #[test]
    fn conservation_holds_per_table() {
        let request = MergeRequest::new(
            vault(&[item("a", 1, "x"), item("b", 5, "x"), item("c", 9, "x")]),
            vault(&[item("b", 6, "y"), item("c", 2, "y"), item("d", 1, "y")]),
        );
        let outcome = merge(&request).unwrap();

        for table_stats in &outcome.tables {
            let ops: Vec<&str> = outcome
                .script
                .ops_for(table_stats.table)
                .map(|op| op.row().id.as_str())
                .collect();
            let unique: BTreeSet<&str> = ops.iter().copied().collect();
            assert_eq!(ops.len(), unique.len());
            assert_eq!(ops.len(), table_stats.union_size());
        }
        assert_eq!(outcome.stats.conflicts, 2);
        assert_eq!(outcome.stats.records_from_local, 1);
        assert_eq!(outcome.stats.records_from_server, 1);
    }

    #[test]
    fn script_follows_registry_order() {
        let request = MergeRequest::new(
            vault(&[
                (TableKind::TotpCodes, SyncableRow::new("t1", 1)),
                item("i1", 1, "x"),
            ]),
            vault(&[(TableKind::Folders, SyncableRow::new("f1", 1))]),
        );
        let outcome = merge(&request).unwrap();

        assert_eq!(
            outcome.script.tables_in_order(),
            vec![TableKind::Folders, TableKind::Items, TableKind::TotpCodes]
        );
        for table in TableKind::ALL {
            for reference in table.references() {
                let parent_last = outcome
                    .script
                    .ops()
                    .iter()
                    .rposition(|op| op.table() == reference.parent);
                let child_first = outcome
                    .script
                    .ops()
                    .iter()
                    .position(|op| op.table() == table);
                if let (Some(parent_last), Some(child_first)) = (parent_last, child_first) {
                    assert!(parent_last < child_first);
                }
            }
        }
    }

    #[test]
    fn merge_is_deterministic() {
        let mut local = vault(&[item("z", 3, "l"), item("a", 4, "l"), item("m", 1, "l")]);
        let server = vault(&[item("m", 2, "s"), item("q", 1, "s")]);
        let first = merge(&MergeRequest::new(local.clone(), server.clone())).unwrap();

        // Row order in the input must not matter.
        local
            .iter_mut()
            .for_each(|snapshot| snapshot.rows.reverse());
        let second = merge(&MergeRequest::new(local, server)).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn remerging_applied_result_has_no_effect() {
        let local = vault(&[item("a", 10, "l"), item("b", 1, "l")]);
        let server = vault(&[item("b", 2, "s"), item("c", 3, "s")]);
        let first = merge(&MergeRequest::new(local, server.clone())).unwrap();

        let mut merged = VaultSnapshot::empty("1.2.0");
        for op in first.script.ops() {
            merged
                .table_mut(op.table())
                .unwrap()
                .rows
                .push(op.row().clone());
        }

        let second = merge(&MergeRequest::new(merged.tables.clone(), server)).unwrap();
        assert_eq!(second.script.effective_changes(&merged.tables), 0);
        assert_eq!(second.stats.records_inserted, 0);
        assert_eq!(second.stats.records_created_locally, 1);
    }

    #[test]
    fn mismatched_table_sets_fail() {
        let mut local = vault(&[]);
        local.retain(|snapshot| snapshot.table != TableKind::Passkeys);
        let error = merge(&MergeRequest::new(local, vault(&[]))).unwrap_err();
        assert!(matches!(error, MergeError::TableSetMismatch { .. }));
    }

    #[test]
    fn duplicate_table_fails() {
        let mut server = vault(&[]);
        server.push(TableSnapshot::empty(TableKind::Items));
        let error = merge(&MergeRequest::new(vault(&[]), server)).unwrap_err();
        assert_eq!(
            error,
            MergeError::DuplicateTable {
                side: Side::Server,
                table: TableKind::Items
            }
        );
    }

    #[test]
    fn malformed_rows_fail() {
        let mut no_timestamp = SyncableRow::new("x1", 0);
        no_timestamp.updated_at = None;
        let error = merge(&MergeRequest::new(
            vault(&[(TableKind::Tags, no_timestamp)]),
            vault(&[]),
        ))
        .unwrap_err();
        assert!(matches!(error, MergeError::MissingUpdatedAt { side: Side::Local, .. }));

        let error = merge(&MergeRequest::new(
            vault(&[]),
            vault(&[(TableKind::Tags, SyncableRow::new("  ", 1))]),
        ))
        .unwrap_err();
        assert_eq!(
            error,
            MergeError::MissingId {
                side: Side::Server,
                table: TableKind::Tags
            }
        );
    }

    #[test]
    fn validate_tables_reports_first_malformed_row() {
        assert_eq!(validate_tables(Side::Server, &vault(&[item("i1", 5, "Mail")])), Ok(()));

        let mut tables = vault(&[
            item("i1", 5, "Mail"),
            (TableKind::Tags, SyncableRow::new("t1", 2)),
            (TableKind::Tags, SyncableRow::new("t1", 3)),
        ]);
        assert_eq!(
            validate_tables(Side::Server, &tables),
            Err(MergeError::DuplicateRowId {
                side: Side::Server,
                table: TableKind::Tags,
                id: "t1".to_string()
            })
        );

        tables.push(TableSnapshot::empty(TableKind::Items));
        assert_eq!(
            validate_tables(Side::Local, &tables),
            Err(MergeError::DuplicateTable {
                side: Side::Local,
                table: TableKind::Items
            })
        );
    }

    #[test]
    fn unknown_columns_and_count_mismatch_are_fine() {
        let request = MergeRequest::new(
            vault(&[(
                TableKind::Logos,
                SyncableRow::new("g1", 1).with_column("future_column", 42),
            )]),
            vault(&[
                (TableKind::Logos, SyncableRow::new("g2", 1)),
                (TableKind::Logos, SyncableRow::new("g3", 1)),
            ]),
        );
        assert!(merge(&request).is_ok());
    }
}
