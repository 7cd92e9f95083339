use std::env;

use serde::Serialize;
use vaultsync_core::compat::{self, CURRENT_SCHEMA_VERSION};
use vaultsync_core::config::SyncConfig;
use vaultsync_core::TableKind;

use crate::commands::common::{format_sync_timestamp, open_vault, Paths};
use crate::error::CliError;
use crate::session;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub server: Option<String>,
    pub has_session: bool,
    pub is_dirty: bool,
    pub is_offline: bool,
    pub mutation_sequence: u64,
    pub server_revision: i64,
    pub last_synced_at: Option<i64>,
    pub vault_version: String,
    pub vault_version_supported: bool,
    pub rows: Vec<TableCount>,
}

#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: TableKind,
    pub live: usize,
    pub deleted: usize,
}

pub async fn collect_status(paths: &Paths, config: &SyncConfig) -> Result<StatusReport, CliError> {
    let vault = open_vault(&paths.db_path)?;
    let state = vault.sync_state();
    let snapshot = vault.snapshot().await?;
    let vault_version = vault
        .vault_version()
        .await?
        .unwrap_or_else(|| CURRENT_SCHEMA_VERSION.to_string());

    let rows = snapshot
        .tables
        .iter()
        .map(|table| {
            let deleted = table.rows.iter().filter(|row| row.is_deleted).count();
            TableCount {
                table: table.table,
                live: table.rows.len() - deleted,
                deleted,
            }
        })
        .collect();

    Ok(StatusReport {
        db_path: paths.db_path.display().to_string(),
        server: config.api_base_url.clone(),
        has_session: session::load_token(env::var("VAULTSYNC_TOKEN").ok(), &paths.state_dir)?
            .is_some(),
        is_dirty: state.is_dirty,
        is_offline: state.is_offline,
        mutation_sequence: state.mutation_sequence,
        server_revision: state.server_revision,
        last_synced_at: vault.last_synced_at().await?,
        vault_version_supported: compat::check(&vault_version).is_compatible,
        vault_version,
        rows,
    })
}

pub fn format_status_lines(status: &StatusReport) -> Vec<String> {
    let sync_line = match (status.is_offline, status.is_dirty) {
        (true, true) => "offline, changes pending",
        (true, false) => "offline",
        (false, true) => "changes pending",
        (false, false) => "clean",
    };
    let mut lines = vec![
        format!("Vault:          {}", status.db_path),
        format!(
            "Server:         {}",
            status.server.as_deref().unwrap_or("(not configured)")
        ),
        format!(
            "Session:        {}",
            if status.has_session { "stored" } else { "none" }
        ),
        format!("State:          {sync_line}"),
        format!("Revision:       {}", status.server_revision),
        format!("Mutations:      {}", status.mutation_sequence),
        format!(
            "Last synced:    {}",
            status
                .last_synced_at
                .map_or_else(|| "never".to_string(), format_sync_timestamp)
        ),
        format!(
            "Schema:         {}{}",
            status.vault_version,
            if status.vault_version_supported {
                ""
            } else {
                " (unsupported, update required)"
            }
        ),
    ];
    for count in status.rows.iter().filter(|count| count.live + count.deleted > 0) {
        lines.push(format!(
            "  {:<18} {:>6} live {:>6} deleted",
            count.table.name(),
            count.live,
            count.deleted
        ));
    }
    lines
}

pub async fn run_status(as_json: bool, paths: &Paths, config: &SyncConfig) -> Result<(), CliError> {
    let status = collect_status(paths, config).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}
