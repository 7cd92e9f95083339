use std::path::PathBuf;

use serde_json::json;
use tempfile::{tempdir, TempDir};
use vaultsync_core::config::SyncConfig;
use vaultsync_core::sync::{SyncError, SyncOutcome, SyncReport};
use vaultsync_core::{SyncState, SyncableRow, TableKind, TableSnapshot, VaultSnapshot};

use crate::cli::{CompletionShell, Toggle};
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::check_version::run_check_version;
use crate::commands::common::{
    format_row_lines, format_sync_timestamp, open_vault, parse_assignments, parse_value,
    resolve_vault_key, Paths,
};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::merge::{format_merge_lines, merge_files, read_snapshot};
use crate::commands::offline::run_offline;
use crate::commands::put::run_put;
use crate::commands::status::{collect_status, format_status_lines};
use crate::commands::sync::{finish_report, format_report_line, run_sync};
use crate::commands::wipe::run_wipe;
use crate::error::CliError;
use crate::session;

fn test_paths() -> (TempDir, Paths) {
    let dir = tempdir().unwrap();
    let paths = Paths::resolve(None, Some(dir.path().join("state")));
    (dir, paths)
}

fn write_snapshot(dir: &TempDir, name: &str, snapshot: &VaultSnapshot) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string(snapshot).unwrap()).unwrap();
    path
}

fn snapshot_with_tags(rows: Vec<SyncableRow>) -> VaultSnapshot {
    VaultSnapshot {
        schema_version: "1.2.0".to_string(),
        tables: vec![TableSnapshot::from_rows(TableKind::Tags, rows)],
    }
}

#[test]
fn paths_default_database_inside_state_dir() {
    let (_dir, paths) = test_paths();
    assert_eq!(paths.db_path, paths.state_dir.join("vault.db"));

    let explicit = Paths::resolve(Some(PathBuf::from("/tmp/x.db")), Some(PathBuf::from("/s")));
    assert_eq!(explicit.db_path, PathBuf::from("/tmp/x.db"));
}

#[test]
fn parse_assignments_keeps_json_types() {
    let columns = parse_assignments(&[
        "name=Email".to_string(),
        "count=3".to_string(),
        "favorite=true".to_string(),
        "note=a=b".to_string(),
    ])
    .unwrap();
    assert_eq!(columns["name"], json!("Email"));
    assert_eq!(columns["count"], json!(3));
    assert_eq!(columns["favorite"], json!(true));
    assert_eq!(columns["note"], json!("a=b"));
}

#[test]
fn parse_assignments_rejects_missing_name() {
    assert!(matches!(
        parse_assignments(&["novalue".to_string()]),
        Err(CliError::InvalidAssignment(_))
    ));
    assert!(matches!(
        parse_assignments(&["=x".to_string()]),
        Err(CliError::InvalidAssignment(_))
    ));
    assert_eq!(parse_value("\"quoted\""), json!("quoted"));
}

#[test]
fn resolve_vault_key_requires_hex() {
    assert!(matches!(resolve_vault_key(None), Err(CliError::MissingVaultKey)));
    assert!(matches!(
        resolve_vault_key(Some("xyz".to_string())),
        Err(CliError::VaultKey(_))
    ));
    assert!(resolve_vault_key(Some("ab".repeat(32))).is_ok());
}

#[test]
fn format_row_lines_marks_tombstones() {
    let mut row = SyncableRow::new("t1", 0).with_column("name", "home");
    row.is_deleted = true;
    let lines = format_row_lines(&[row]);
    assert_eq!(
        lines,
        vec![r#"t1  1970-01-01 00:00:00 UTC  {"name":"home"}  [deleted]"#.to_string()]
    );
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[tokio::test(flavor = "current_thread")]
async fn put_then_delete_roundtrip() {
    let (_dir, paths) = test_paths();
    let folder_id = run_put(
        TableKind::Folders,
        None,
        &["name=Work".to_string()],
        &paths.db_path,
    )
    .await
    .unwrap();
    run_put(
        TableKind::Items,
        Some("i1"),
        &[format!("folder_id={folder_id}"), "name=Mail".to_string()],
        &paths.db_path,
    )
    .await
    .unwrap();

    run_delete(TableKind::Items, "i1", &paths.db_path).await.unwrap();

    let vault = open_vault(&paths.db_path).unwrap();
    assert!(vault.list_rows(TableKind::Items, false).await.unwrap().is_empty());
    let all = vault.list_rows(TableKind::Items, true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].column_str("folder_id"), Some(folder_id.as_str()));
    assert_eq!(vault.sync_state().mutation_sequence, 3);
}

#[tokio::test(flavor = "current_thread")]
async fn put_rejects_unknown_parent() {
    let (_dir, paths) = test_paths();
    let error = run_put(
        TableKind::Items,
        None,
        &["folder_id=missing".to_string()],
        &paths.db_path,
    )
    .await
    .unwrap_err();
    assert!(matches!(error, CliError::Core(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn offline_toggle_and_status() {
    let (_dir, paths) = test_paths();
    run_put(TableKind::Tags, Some("t1"), &[], &paths.db_path)
        .await
        .unwrap();
    run_offline(Toggle::On, &paths.db_path).await.unwrap();

    let config = SyncConfig::default().with_api_base_url("https://vault.example.com");
    let status = collect_status(&paths, &config).await.unwrap();
    assert!(status.is_offline);
    assert!(status.is_dirty);
    assert_eq!(status.mutation_sequence, 1);
    assert!(status.vault_version_supported);
    let tags = status
        .rows
        .iter()
        .find(|count| count.table == TableKind::Tags)
        .unwrap();
    assert_eq!(tags.live, 1);

    let lines = format_status_lines(&status);
    assert!(lines.iter().any(|line| line.contains("offline, changes pending")));
    assert!(lines.iter().any(|line| line.contains("https://vault.example.com")));

    run_offline(Toggle::Off, &paths.db_path).await.unwrap();
    assert!(!collect_status(&paths, &config).await.unwrap().is_offline);
}

#[tokio::test(flavor = "current_thread")]
async fn wipe_requires_confirmation() {
    let (_dir, paths) = test_paths();
    run_put(TableKind::Tags, Some("t1"), &[], &paths.db_path)
        .await
        .unwrap();

    assert!(matches!(
        run_wipe(false, &paths.db_path).await,
        Err(CliError::ConfirmationRequired)
    ));
    run_wipe(true, &paths.db_path).await.unwrap();

    let vault = open_vault(&paths.db_path).unwrap();
    assert!(vault.list_rows(TableKind::Tags, true).await.unwrap().is_empty());
    assert!(!vault.sync_state().is_dirty);
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_server_configuration() {
    let (_dir, paths) = test_paths();
    let error = run_sync(None, &paths, &SyncConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}

#[test]
fn merge_files_reports_statistics() {
    let dir = tempdir().unwrap();
    let local = write_snapshot(
        &dir,
        "local.json",
        &snapshot_with_tags(vec![
            SyncableRow::new("A1", 10),
            SyncableRow::new("B1", 100).with_column("name", "local"),
        ]),
    );
    let server = write_snapshot(
        &dir,
        "server.json",
        &snapshot_with_tags(vec![SyncableRow::new("B1", 200).with_column("name", "server")]),
    );

    let outcome = merge_files(&local, &server).unwrap();
    assert_eq!(outcome.stats.records_created_locally, 1);
    assert_eq!(outcome.stats.records_from_server, 1);
    assert_eq!(outcome.stats.conflicts, 1);
    assert_eq!(outcome.script.len(), 2);

    let lines = format_merge_lines(&outcome);
    assert!(lines[1].starts_with("tags"));
    assert!(lines
        .last()
        .unwrap()
        .contains("1 tables, 2 writes, 1 conflicts"));
}

#[test]
fn merge_files_rejects_mismatched_tables() {
    let dir = tempdir().unwrap();
    let local = write_snapshot(&dir, "local.json", &snapshot_with_tags(Vec::new()));
    let server = write_snapshot(&dir, "server.json", &VaultSnapshot::empty("1.2.0"));
    assert!(matches!(
        merge_files(&local, &server),
        Err(CliError::Merge(_))
    ));
}

#[test]
fn read_snapshot_checks_version_and_shape() {
    let dir = tempdir().unwrap();
    let mut future = snapshot_with_tags(Vec::new());
    future.schema_version = "2.0.0".to_string();
    let path = write_snapshot(&dir, "future.json", &future);
    assert!(matches!(read_snapshot(&path), Err(CliError::Incompatible(_))));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{").unwrap();
    assert!(matches!(
        read_snapshot(&garbage),
        Err(CliError::Snapshot { .. })
    ));
}

#[test]
fn check_version_accepts_same_major_only() {
    assert!(run_check_version("1.4.0").is_ok());
    assert!(matches!(
        run_check_version("3.0.0"),
        Err(CliError::Incompatible(_))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn logout_clears_session_and_wipes_vault() {
    let (_dir, paths) = test_paths();
    run_put(TableKind::Tags, Some("t1"), &[], &paths.db_path)
        .await
        .unwrap();
    run_login(" secret-token ", &paths.state_dir).unwrap();
    assert_eq!(
        session::load_token(None, &paths.state_dir).unwrap().as_deref(),
        Some("secret-token")
    );
    assert_eq!(
        session::load_token(Some("from-env".to_string()), &paths.state_dir)
            .unwrap()
            .as_deref(),
        Some("from-env")
    );

    run_logout(&paths.state_dir, &paths.db_path).await.unwrap();
    assert_eq!(session::load_token(None, &paths.state_dir).unwrap(), None);
    assert!(!session::clear_token(&paths.state_dir).unwrap());

    let vault = open_vault(&paths.db_path).unwrap();
    assert!(vault.list_rows(TableKind::Tags, true).await.unwrap().is_empty());
    assert_eq!(vault.sync_state(), SyncState::default());
}

#[test]
fn login_rejects_blank_token() {
    let (_dir, paths) = test_paths();
    assert!(matches!(
        run_login("   ", &paths.state_dir),
        Err(CliError::MissingToken)
    ));
    assert_eq!(session::load_token(None, &paths.state_dir).unwrap(), None);
}

#[test]
fn sessions_are_kept_per_state_dir() {
    let (_first_dir, first) = test_paths();
    let (_second_dir, second) = test_paths();
    session::save_token(&first.state_dir, "first").unwrap();

    assert_eq!(session::load_token(None, &second.state_dir).unwrap(), None);
    assert!(!session::clear_token(&second.state_dir).unwrap());
    assert_eq!(
        session::load_token(None, &first.state_dir).unwrap().as_deref(),
        Some("first")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn unauthorized_report_clears_session_but_keeps_vault() {
    let (_dir, paths) = test_paths();
    run_put(TableKind::Tags, Some("t1"), &[], &paths.db_path)
        .await
        .unwrap();
    session::save_token(&paths.state_dir, "stale").unwrap();

    let report = SyncReport {
        outcome: SyncOutcome::Error,
        revision: None,
        was_offline: false,
        error: Some(SyncError::Unauthorized),
        merge: None,
    };
    let error = finish_report(report, &paths.state_dir).unwrap_err();
    assert!(matches!(error, CliError::SessionExpired));
    assert_eq!(session::load_token(None, &paths.state_dir).unwrap(), None);

    let vault = open_vault(&paths.db_path).unwrap();
    assert_eq!(vault.list_rows(TableKind::Tags, true).await.unwrap().len(), 1);
    assert!(vault.sync_state().is_dirty);
}

#[test]
fn report_lines_describe_outcome() {
    let uploaded = SyncReport {
        outcome: SyncOutcome::Uploaded,
        revision: Some(4),
        was_offline: false,
        error: None,
        merge: None,
    };
    assert_eq!(format_report_line(&uploaded), "uploaded (revision 4)");

    let offline = SyncReport {
        outcome: SyncOutcome::Error,
        revision: None,
        was_offline: true,
        error: Some(SyncError::Offline),
        merge: None,
    };
    assert!(format_report_line(&offline).starts_with("offline:"));
    assert!(finish_report(offline, std::path::Path::new(".")).is_err());
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempdir().unwrap();
    let output_path = dir.path().join("vaultsync.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_vaultsync()"));
    assert!(script.contains("complete -F _vaultsync"));
}
