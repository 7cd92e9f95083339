//! Offline merge diagnostics on two plaintext snapshot files.

use std::path::Path;

use vaultsync_core::compat;
use vaultsync_core::{merge, MergeOutcome, MergeRequest, VaultSnapshot};

use crate::error::CliError;

pub fn read_snapshot(path: &Path) -> Result<VaultSnapshot, CliError> {
    let snapshot_error = |message: String| CliError::Snapshot {
        path: path.display().to_string(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|error| snapshot_error(error.to_string()))?;
    let snapshot: VaultSnapshot =
        serde_json::from_str(&raw).map_err(|error| snapshot_error(error.to_string()))?;
    compat::ensure_compatible(&snapshot.schema_version)?;
    Ok(snapshot)
}

pub fn merge_files(local: &Path, server: &Path) -> Result<MergeOutcome, CliError> {
    let local = read_snapshot(local)?;
    let server = read_snapshot(server)?;
    Ok(merge(&MergeRequest::new(local.tables, server.tables))?)
}

pub fn format_merge_lines(outcome: &MergeOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<18} {:>7} {:>7} {:>7} {:>7} {:>9}",
        "table", "local", "server", "created", "pulled", "conflicts"
    )];
    for table in &outcome.tables {
        lines.push(format!(
            "{:<18} {:>7} {:>7} {:>7} {:>7} {:>9}",
            table.table.name(),
            table.records_from_local,
            table.records_from_server,
            table.records_created_locally,
            table.records_inserted,
            table.conflicts
        ));
    }
    let stats = &outcome.stats;
    lines.push(format!(
        "{} tables, {} writes, {} conflicts ({} kept local, {} kept server)",
        stats.tables_processed,
        outcome.script.len(),
        stats.conflicts,
        stats.records_from_local,
        stats.records_from_server
    ));
    lines
}

pub fn run_merge(local: &Path, server: &Path, as_json: bool) -> Result<(), CliError> {
    let outcome = merge_files(local, server)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in format_merge_lines(&outcome) {
            println!("{line}");
        }
    }
    Ok(())
}
