//! Database migrations

use rusqlite::Connection;

use crate::error::Result;
use crate::registry::TableKind;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    debug_assert_eq!(get_version(conn)?, CURRENT_VERSION);
    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// DDL for one syncable table. Foreign key columns are projections of the
/// matching entries in `columns` so that `SQLite` can enforce them.
pub(crate) fn create_table_sql(table: TableKind) -> String {
    let mut definition = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            updated_at INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,",
        table.name()
    );
    for reference in table.references() {
        definition.push_str(&format!(
            "\n            {} TEXT REFERENCES {}(id),",
            reference.column,
            reference.parent.name()
        ));
    }
    definition.push_str("\n            columns TEXT NOT NULL DEFAULT '{}'\n        )");
    definition
}

/// Migration to version 1: syncable tables and sync bookkeeping
fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut batch = String::from("BEGIN TRANSACTION;\n");
    batch.push_str(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS vault_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            is_dirty INTEGER NOT NULL DEFAULT 0,
            mutation_sequence INTEGER NOT NULL DEFAULT 0,
            server_revision INTEGER NOT NULL DEFAULT 0,
            is_offline INTEGER NOT NULL DEFAULT 0
        );
        INSERT OR IGNORE INTO sync_state (id) VALUES (1);\n",
    );
    for table in TableKind::ALL {
        batch.push_str(&create_table_sql(table));
        batch.push_str(";\n");
    }
    batch.push_str("INSERT INTO schema_version (version) VALUES (1);\nCOMMIT;");

    conn.execute_batch(&batch)?;
    tracing::info!("Applied vault migration v1");
    Ok(())
}

/// Migration to version 2: indexes used for change listing
fn migrate_v2(conn: &Connection) -> Result<()> {
    let mut batch = String::from("BEGIN TRANSACTION;\n");
    for table in TableKind::ALL {
        batch.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_updated ON {name}(updated_at DESC);\n",
            name = table.name()
        ));
        for reference in table.references() {
            batch.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_{column} ON {name}({column});\n",
                name = table.name(),
                column = reference.column
            ));
        }
    }
    batch.push_str("INSERT INTO schema_version (version) VALUES (2);\nCOMMIT;");

    conn.execute_batch(&batch)?;
    tracing::info!("Applied vault migration v2");
    Ok(())
}
