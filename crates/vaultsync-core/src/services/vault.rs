//! Shared vault service used by the CLI and the sync orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::compat::CURRENT_SCHEMA_VERSION;
use crate::db::{Database, SqliteVaultRepository, VaultRepository};
use crate::merge::ChangeScript;
use crate::models::{new_row_id, Columns, SyncState, SyncableRow, VaultSnapshot};
use crate::registry::TableKind;
use crate::sync::SyncStateTracker;
use crate::util::unix_millis_now;
use crate::{Error, Result};

const LAST_SYNCED_AT_KEY: &str = "last_synced_at";
const RESERVED_COLUMNS: [&str; 3] = ["id", "updated_at", "is_deleted"];

/// Thread-safe handle to one local vault and its sync state.
#[derive(Clone)]
pub struct VaultService {
    db: Arc<Mutex<Database>>,
    tracker: SyncStateTracker,
    db_path: Option<PathBuf>,
}

impl VaultService {
    /// Open a vault at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local vault at {} is not a database ({}); moving it aside",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_file(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };
        Self::from_database(db, Some(db_path))
    }

    /// Open an in-memory vault (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?, None)
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Result<Self> {
        let state = SqliteVaultRepository::new(db.connection()).load_sync_state()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            tracker: SyncStateTracker::new(state),
            db_path,
        })
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_file(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let file_name = db_path
                .file_name()
                .map_or_else(|| "vault.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));
            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local vault from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }
        Ok(())
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Shared sync state handle.
    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    pub fn sync_state(&self) -> SyncState {
        self.tracker.snapshot()
    }

    /// List rows of one table ordered by id.
    pub async fn list_rows(
        &self,
        table: TableKind,
        include_deleted: bool,
    ) -> Result<Vec<SyncableRow>> {
        let db = self.db.lock().await;
        let repo = SqliteVaultRepository::new(db.connection());
        let snapshot = repo.read_table(table)?;
        Ok(snapshot
            .rows
            .into_iter()
            .filter(|row| include_deleted || !row.is_deleted)
            .collect())
    }

    pub async fn get_row(&self, table: TableKind, id: &str) -> Result<Option<SyncableRow>> {
        let db = self.db.lock().await;
        let repo = SqliteVaultRepository::new(db.connection());
        repo.get_row(table, id)
    }

    /// Create a row, or update the named row's columns.
    ///
    /// Given columns are merged over the stored ones. A write to a
    /// soft-deleted row restores it.
    pub async fn put_row(
        &self,
        table: TableKind,
        id: Option<&str>,
        columns: Columns,
    ) -> Result<SyncableRow> {
        if let Some(reserved) = RESERVED_COLUMNS
            .iter()
            .find(|name| columns.contains_key(**name))
        {
            return Err(Error::InvalidInput(format!(
                "`{reserved}` is managed by the vault and cannot be set"
            )));
        }
        let id = match id.map(str::trim) {
            Some("") => return Err(Error::InvalidInput("row id cannot be empty".to_string())),
            Some(id) => id.to_string(),
            None => new_row_id(),
        };

        let db = self.db.lock().await;
        let next_state = self.tracker.snapshot().with_mutation();
        let row = db.transaction(|repo| {
            let previous = repo.get_row(table, &id)?;
            let mut row = previous.clone().unwrap_or_else(|| SyncableRow {
                id: id.clone(),
                ..SyncableRow::default()
            });
            row.updated_at = Some(next_timestamp(previous.as_ref()));
            row.is_deleted = false;
            row.columns.extend(columns);

            repo.upsert_row(table, &row)?;
            repo.save_sync_state(&next_state)?;
            Ok(row)
        })?;
        self.tracker.commit(next_state);

        tracing::debug!(%table, id = %row.id, "Row written");
        Ok(row)
    }

    /// Mark a row deleted. Deleting an already deleted row is a no-op.
    pub async fn soft_delete_row(&self, table: TableKind, id: &str) -> Result<SyncableRow> {
        let db = self.db.lock().await;
        let next_state = self.tracker.snapshot().with_mutation();
        let (row, mutated) = db.transaction(|repo| {
            let mut row = repo
                .get_row(table, id)?
                .ok_or_else(|| Error::NotFound(format!("{table}/{id}")))?;
            if row.is_deleted {
                return Ok((row, false));
            }
            row.updated_at = Some(next_timestamp(Some(&row)));
            row.is_deleted = true;
            repo.upsert_row(table, &row)?;
            repo.save_sync_state(&next_state)?;
            Ok((row, true))
        })?;
        if mutated {
            self.tracker.commit(next_state);
            tracing::debug!(%table, id, "Row soft-deleted");
        }
        Ok(row)
    }

    /// Plaintext copy of the whole vault, tombstones included.
    pub async fn snapshot(&self) -> Result<VaultSnapshot> {
        let db = self.db.lock().await;
        let repo = SqliteVaultRepository::new(db.connection());
        Ok(VaultSnapshot {
            schema_version: repo
                .vault_version()?
                .unwrap_or_else(|| CURRENT_SCHEMA_VERSION.to_string()),
            tables: repo.read_all()?,
        })
    }

    /// Recorded vault schema marker, if any.
    pub async fn vault_version(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        SqliteVaultRepository::new(db.connection()).vault_version()
    }

    /// Apply a merge result in one transaction and adopt `schema_version`.
    ///
    /// Not a local mutation: the sequence is left alone.
    pub async fn apply_change_script(
        &self,
        script: &ChangeScript,
        schema_version: &str,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        db.transaction(|repo| {
            let written = repo.apply_change_script(script)?;
            repo.set_vault_version(schema_version)?;
            Ok(written)
        })
    }

    /// Replace the local vault with a downloaded one, unless a local write
    /// landed after `expected_sequence` was read.
    pub async fn replace_if_unchanged(
        &self,
        vault: &VaultSnapshot,
        revision: i64,
        expected_sequence: u64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let current = self.tracker.snapshot();
        if current.mutation_sequence != expected_sequence {
            tracing::debug!(
                expected_sequence,
                current_sequence = current.mutation_sequence,
                "Local write raced the download"
            );
            return Ok(false);
        }

        let next_state = current.after_download(revision);
        db.transaction(|repo| {
            repo.replace_all(&vault.tables)?;
            repo.set_vault_version(&vault.schema_version)?;
            repo.set_metadata(LAST_SYNCED_AT_KEY, &unix_millis_now().to_string())?;
            repo.save_sync_state(&next_state)
        })?;
        self.tracker.commit(next_state);
        Ok(true)
    }

    /// Record a successful push of the vault as seen at `seq_at_start`.
    pub async fn complete_push(
        &self,
        seq_at_start: u64,
        revision: i64,
        schema_version: &str,
    ) -> Result<SyncState> {
        let db = self.db.lock().await;
        let next_state = self.tracker.snapshot().after_push(seq_at_start, revision);
        db.transaction(|repo| {
            repo.set_vault_version(schema_version)?;
            repo.set_metadata(LAST_SYNCED_AT_KEY, &unix_millis_now().to_string())?;
            repo.save_sync_state(&next_state)
        })?;
        self.tracker.commit(next_state);
        Ok(next_state)
    }

    /// Suspend or resume sync attempts.
    pub async fn set_offline(&self, is_offline: bool) -> Result<SyncState> {
        let db = self.db.lock().await;
        let next_state = self.tracker.snapshot().with_offline(is_offline);
        SqliteVaultRepository::new(db.connection()).save_sync_state(&next_state)?;
        self.tracker.commit(next_state);
        Ok(next_state)
    }

    /// Unix millis of the last successful upload, merge or download.
    pub async fn last_synced_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        let value = SqliteVaultRepository::new(db.connection()).metadata(LAST_SYNCED_AT_KEY)?;
        Ok(value.and_then(|value| value.parse().ok()))
    }

    /// Drop every row and reset sync bookkeeping.
    pub async fn wipe(&self) -> Result<()> {
        let db = self.db.lock().await;
        let next_state = SyncState::default();
        db.transaction(|repo| {
            repo.clear_all()?;
            repo.clear_metadata()?;
            repo.save_sync_state(&next_state)
        })?;
        self.tracker.commit(next_state);
        tracing::info!("Local vault wiped");
        Ok(())
    }
}

/// `max(now, previous + 1)` so a row's timestamp always moves forward.
fn next_timestamp(previous: Option<&SyncableRow>) -> i64 {
    let now = unix_millis_now();
    previous
        .and_then(|row| row.updated_at)
        .map_or(now, |updated_at| now.max(updated_at.saturating_add(1)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::models::TableSnapshot;

    fn columns(pairs: &[(&str, serde_json::Value)]) -> Columns {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn put_row_creates_and_tracks_mutation() {
        let service = VaultService::open_in_memory().unwrap();
        let row = service
            .put_row(TableKind::Folders, None, columns(&[("name", json!("Work"))]))
            .await
            .unwrap();

        assert!(!row.id.is_empty());
        assert!(row.updated_at.is_some());
        let state = service.sync_state();
        assert!(state.is_dirty);
        assert_eq!(state.mutation_sequence, 1);

        let listed = service.list_rows(TableKind::Folders, false).await.unwrap();
        assert_eq!(listed, vec![row]);
    }

    #[tokio::test]
    async fn put_row_merges_columns_and_advances_timestamp() {
        let service = VaultService::open_in_memory().unwrap();
        let first = service
            .put_row(
                TableKind::Tags,
                Some("t1"),
                columns(&[("name", json!("a")), ("color", json!("red"))]),
            )
            .await
            .unwrap();
        let second = service
            .put_row(TableKind::Tags, Some("t1"), columns(&[("name", json!("b"))]))
            .await
            .unwrap();

        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.column_str("name"), Some("b"));
        assert_eq!(second.column_str("color"), Some("red"));
        assert_eq!(service.sync_state().mutation_sequence, 2);
    }

    #[tokio::test]
    async fn put_row_rejects_reserved_columns_and_blank_ids() {
        let service = VaultService::open_in_memory().unwrap();
        assert!(matches!(
            service
                .put_row(TableKind::Tags, None, columns(&[("is_deleted", json!(true))]))
                .await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            service.put_row(TableKind::Tags, Some(" "), Columns::new()).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(service.sync_state(), SyncState::default());
    }

    #[tokio::test]
    async fn failed_write_does_not_count_as_mutation() {
        let service = VaultService::open_in_memory().unwrap();
        let result = service
            .put_row(
                TableKind::Items,
                Some("i1"),
                columns(&[("folder_id", json!("missing"))]),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(service.sync_state().mutation_sequence, 0);
    }

    #[tokio::test]
    async fn soft_delete_keeps_tombstone() {
        let service = VaultService::open_in_memory().unwrap();
        service
            .put_row(TableKind::Tags, Some("t1"), Columns::new())
            .await
            .unwrap();

        let deleted = service.soft_delete_row(TableKind::Tags, "t1").await.unwrap();
        assert!(deleted.is_deleted);
        assert!(service.list_rows(TableKind::Tags, false).await.unwrap().is_empty());
        assert_eq!(service.list_rows(TableKind::Tags, true).await.unwrap().len(), 1);

        service.soft_delete_row(TableKind::Tags, "t1").await.unwrap();
        assert_eq!(service.sync_state().mutation_sequence, 2);

        assert!(matches!(
            service.soft_delete_row(TableKind::Tags, "missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn replace_if_unchanged_refuses_raced_write() {
        let service = VaultService::open_in_memory().unwrap();
        service
            .put_row(TableKind::Tags, Some("local"), Columns::new())
            .await
            .unwrap();

        let mut incoming = VaultSnapshot::empty("1.2.0");
        if let Some(tags) = incoming.table_mut(TableKind::Tags) {
            tags.rows.push(SyncableRow::new("remote", 1));
        }

        assert!(!service.replace_if_unchanged(&incoming, 3, 0).await.unwrap());
        assert!(service.get_row(TableKind::Tags, "local").await.unwrap().is_some());

        assert!(service.replace_if_unchanged(&incoming, 3, 1).await.unwrap());
        assert!(service.get_row(TableKind::Tags, "local").await.unwrap().is_none());
        let state = service.sync_state();
        assert!(!state.is_dirty);
        assert_eq!(state.server_revision, 3);
        assert!(service.last_synced_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn snapshot_defaults_to_current_schema() {
        let service = VaultService::open_in_memory().unwrap();
        let snapshot = service.snapshot().await.unwrap();
        assert_eq!(snapshot.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(snapshot.tables.len(), TableKind::ALL.len());

        let script = crate::merge::merge(&crate::merge::MergeRequest::new(
            vec![TableSnapshot::empty(TableKind::Tags)],
            vec![TableSnapshot::from_rows(
                TableKind::Tags,
                [SyncableRow::new("t1", 5)],
            )],
        ))
        .unwrap()
        .script;
        service.apply_change_script(&script, "1.1.0").await.unwrap();
        let snapshot = service.snapshot().await.unwrap();
        assert_eq!(snapshot.schema_version, "1.1.0");
        assert_eq!(snapshot.row_count(), 1);
        assert_eq!(service.sync_state().mutation_sequence, 0);
    }

    #[tokio::test]
    async fn complete_push_after_concurrent_write_stays_dirty() {
        let service = VaultService::open_in_memory().unwrap();
        service
            .put_row(TableKind::Tags, Some("a"), Columns::new())
            .await
            .unwrap();
        let seq_at_start = service.sync_state().mutation_sequence;
        service
            .put_row(TableKind::Tags, Some("b"), Columns::new())
            .await
            .unwrap();

        let state = service
            .complete_push(seq_at_start, 1, CURRENT_SCHEMA_VERSION)
            .await
            .unwrap();
        assert!(state.is_dirty);
        assert_eq!(state.server_revision, 1);
    }

    #[tokio::test]
    async fn state_persists_across_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("vault.db");
        {
            let service = VaultService::open_path(&path).unwrap();
            service
                .put_row(TableKind::Tags, Some("t1"), Columns::new())
                .await
                .unwrap();
            service.set_offline(true).await.unwrap();
        }

        let service = VaultService::open_path(&path).unwrap();
        let state = service.sync_state();
        assert!(state.is_dirty && state.is_offline);
        assert_eq!(state.mutation_sequence, 1);
        assert_eq!(service.db_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn corrupted_file_is_moved_aside() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("vault.db");
        std::fs::write(&path, b"definitely not sqlite, just some bytes padding out a page").unwrap();

        let service = VaultService::open_path(&path).unwrap();
        assert_eq!(service.sync_state(), SyncState::default());

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("vault.db.corrupt-"))
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn wipe_resets_everything() {
        let service = VaultService::open_in_memory().unwrap();
        service
            .put_row(TableKind::Tags, Some("t1"), Columns::new())
            .await
            .unwrap();
        service.complete_push(1, 4, "1.2.0").await.unwrap();

        service.wipe().await.unwrap();
        assert_eq!(service.sync_state(), SyncState::default());
        assert_eq!(service.snapshot().await.unwrap().row_count(), 0);
        assert_eq!(service.vault_version().await.unwrap(), None);
        assert_eq!(service.last_synced_at().await.unwrap(), None);
    }
}
