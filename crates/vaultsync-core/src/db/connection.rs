//! Database connection management

use std::path::Path;

use rusqlite::Connection;

use super::migrations;
use super::repository::SqliteVaultRepository;
use crate::error::Result;

/// Local vault database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for local use
    fn configure(&self) -> Result<()> {
        // WAL is unavailable for in-memory databases; ignore the result there
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `operation` inside one transaction, committing only on success.
    pub fn transaction<T>(
        &self,
        operation: impl FnOnce(&SqliteVaultRepository<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = operation(&SqliteVaultRepository::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::VaultRepository;
    use crate::models::SyncableRow;
    use crate::registry::TableKind;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory_enforces_foreign_keys() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i32 = db
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("vault.db");
        {
            let db = Database::open(&path).unwrap();
            db.transaction(|repo| repo.upsert_row(TableKind::Tags, &SyncableRow::new("t1", 1)))
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let repo = SqliteVaultRepository::new(db.connection());
        assert!(repo.get_row(TableKind::Tags, "t1").unwrap().is_some());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.transaction(|repo| {
            repo.upsert_row(TableKind::Tags, &SyncableRow::new("t1", 1))?;
            Err(crate::Error::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());

        let repo = SqliteVaultRepository::new(db.connection());
        assert!(repo.get_row(TableKind::Tags, "t1").unwrap().is_none());
    }
}
