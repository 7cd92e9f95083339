//! Vault repository implementation

use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::merge::ChangeScript;
use crate::models::{Columns, SyncState, SyncableRow, TableSnapshot};
use crate::registry::TableKind;

/// Storage operations on the local vault.
///
/// Implementations do not open transactions themselves; callers group
/// operations through `Database::transaction`.
pub trait VaultRepository {
    /// Read every row of one table, tombstones included
    fn read_table(&self, table: TableKind) -> Result<TableSnapshot>;

    /// Read every syncable table in registry order
    fn read_all(&self) -> Result<Vec<TableSnapshot>>;

    /// Get one row by id
    fn get_row(&self, table: TableKind, id: &str) -> Result<Option<SyncableRow>>;

    /// Insert a row or replace the stored one, unless the stored row is newer
    fn upsert_row(&self, table: TableKind, row: &SyncableRow) -> Result<bool>;

    /// Replay a change script, returning how many rows were written
    fn apply_change_script(&self, script: &ChangeScript) -> Result<usize>;

    /// Remove every syncable row
    fn clear_all(&self) -> Result<()>;

    /// Replace every syncable table with the given snapshots
    fn replace_all(&self, tables: &[TableSnapshot]) -> Result<()>;

    /// Load persisted sync bookkeeping
    fn load_sync_state(&self) -> Result<SyncState>;

    /// Persist sync bookkeeping (`is_syncing` is never stored)
    fn save_sync_state(&self, state: &SyncState) -> Result<()>;

    /// Read a metadata value
    fn metadata(&self, key: &str) -> Result<Option<String>>;

    /// Write a metadata value
    fn set_metadata(&self, key: &str, value: &str) -> Result<()>;

    /// Remove every metadata value
    fn clear_metadata(&self) -> Result<()>;

    /// Schema version marker of the local vault, if one was recorded
    fn vault_version(&self) -> Result<Option<String>> {
        self.metadata(VAULT_VERSION_KEY)
    }

    fn set_vault_version(&self, version: &str) -> Result<()> {
        self.set_metadata(VAULT_VERSION_KEY, version)
    }
}

/// Metadata key holding the vault schema version marker
pub const VAULT_VERSION_KEY: &str = "vault_version";

/// `SQLite` implementation of `VaultRepository`
pub struct SqliteVaultRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteVaultRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn upsert_sql(table: TableKind) -> String {
        let fk_columns: Vec<&str> = table
            .references()
            .iter()
            .map(|reference| reference.column)
            .collect();

        let mut columns = vec!["id", "updated_at", "is_deleted"];
        columns.extend(&fk_columns);
        columns.push("columns");

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = columns
            .iter()
            .skip(1)
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {name} ({columns}) VALUES ({placeholders})
             ON CONFLICT(id) DO UPDATE SET {updates}
             WHERE excluded.updated_at >= {name}.updated_at",
            name = table.name(),
            columns = columns.join(", "),
        )
    }

    fn row_params(table: TableKind, row: &SyncableRow) -> Result<Vec<SqlValue>> {
        if !row.has_id() {
            return Err(Error::InvalidInput(format!("{table} row is missing its id")));
        }
        let updated_at = row.updated_at.ok_or_else(|| {
            Error::InvalidInput(format!("{table} row {} is missing updated_at", row.id))
        })?;

        let mut values = vec![
            SqlValue::Text(row.id.clone()),
            SqlValue::Integer(updated_at),
            SqlValue::Integer(i64::from(row.is_deleted)),
        ];
        for reference in table.references() {
            values.push(
                row.column_str(reference.column)
                    .map_or(SqlValue::Null, |value| SqlValue::Text(value.to_string())),
            );
        }
        values.push(SqlValue::Text(serde_json::to_string(&row.columns)?));
        Ok(values)
    }

    /// Parse a row from a `SELECT id, updated_at, is_deleted, columns` result
    fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncableRow> {
        let raw_columns: String = row.get(3)?;
        let columns: Columns = serde_json::from_str(&raw_columns)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        Ok(SyncableRow {
            id: row.get(0)?,
            updated_at: Some(row.get(1)?),
            is_deleted: row.get::<_, i32>(2)? != 0,
            columns,
        })
    }

    fn insert_rows(&self, snapshot: &TableSnapshot) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(&Self::upsert_sql(snapshot.table))?;
        let mut written = 0;
        for row in &snapshot.rows {
            written += stmt.execute(params_from_iter(Self::row_params(snapshot.table, row)?))?;
        }
        Ok(written)
    }
}

impl VaultRepository for SqliteVaultRepository<'_> {
    fn read_table(&self, table: TableKind) -> Result<TableSnapshot> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, updated_at, is_deleted, columns FROM {} ORDER BY id",
            table.name()
        ))?;
        let rows = stmt
            .query_map([], Self::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(TableSnapshot::from_rows(table, rows))
    }

    fn read_all(&self) -> Result<Vec<TableSnapshot>> {
        TableKind::ALL
            .into_iter()
            .map(|table| self.read_table(table))
            .collect()
    }

    fn get_row(&self, table: TableKind, id: &str) -> Result<Option<SyncableRow>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, updated_at, is_deleted, columns FROM {} WHERE id = ?",
                    table.name()
                ),
                params![id],
                Self::parse_row,
            )
            .optional()?;
        Ok(row)
    }

    fn upsert_row(&self, table: TableKind, row: &SyncableRow) -> Result<bool> {
        let written = self.conn.execute(
            &Self::upsert_sql(table),
            params_from_iter(Self::row_params(table, row)?),
        )?;
        Ok(written > 0)
    }

    fn apply_change_script(&self, script: &ChangeScript) -> Result<usize> {
        let mut written = 0;
        for table in script.tables_in_order() {
            let rows = script.ops_for(table).map(|op| op.row().clone());
            written += self.insert_rows(&TableSnapshot::from_rows(table, rows))?;
        }
        Ok(written)
    }

    fn clear_all(&self) -> Result<()> {
        for table in TableKind::ALL.into_iter().rev() {
            self.conn
                .execute(&format!("DELETE FROM {}", table.name()), [])?;
        }
        Ok(())
    }

    fn replace_all(&self, tables: &[TableSnapshot]) -> Result<()> {
        self.clear_all()?;
        for table in TableKind::ALL {
            for snapshot in tables.iter().filter(|snapshot| snapshot.table == table) {
                self.insert_rows(snapshot)?;
            }
        }
        Ok(())
    }

    fn load_sync_state(&self) -> Result<SyncState> {
        let state = self.conn.query_row(
            "SELECT is_dirty, mutation_sequence, server_revision, is_offline FROM sync_state WHERE id = 1",
            [],
            |row| {
                Ok(SyncState {
                    is_dirty: row.get::<_, i32>(0)? != 0,
                    mutation_sequence: u64::try_from(row.get::<_, i64>(1)?).unwrap_or_default(),
                    server_revision: row.get(2)?,
                    is_syncing: false,
                    is_offline: row.get::<_, i32>(3)? != 0,
                })
            },
        )?;
        Ok(state)
    }

    fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (id, is_dirty, mutation_sequence, server_revision, is_offline)
             VALUES (1, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                is_dirty = excluded.is_dirty,
                mutation_sequence = excluded.mutation_sequence,
                server_revision = excluded.server_revision,
                is_offline = excluded.is_offline",
            params![
                i32::from(state.is_dirty),
                i64::try_from(state.mutation_sequence).unwrap_or(i64::MAX),
                state.server_revision,
                i32::from(state.is_offline)
            ],
        )?;
        Ok(())
    }

    fn metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM vault_metadata WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO vault_metadata (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn clear_metadata(&self) -> Result<()> {
        self.conn.execute("DELETE FROM vault_metadata", [])?;
        Ok(())
    }
}
