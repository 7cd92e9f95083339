use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use vaultsync_core::config::SyncConfig;
use vaultsync_core::crypto::XChaChaVaultCipher;
use vaultsync_core::models::Columns;
use vaultsync_core::services::VaultService;
use vaultsync_core::sync::{HttpRemoteVault, SyncOrchestrator};
use vaultsync_core::util::normalize_text_option;
use vaultsync_core::SyncableRow;

use crate::error::CliError;
use crate::session;

/// Filesystem locations resolved from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Paths {
    pub fn resolve(cli_db_path: Option<PathBuf>, cli_state_dir: Option<PathBuf>) -> Self {
        let state_dir = cli_state_dir
            .or_else(|| env::var_os("VAULTSYNC_STATE_DIR").map(PathBuf::from))
            .unwrap_or_else(default_state_dir);
        let db_path = cli_db_path
            .or_else(|| env::var_os("VAULTSYNC_DB_PATH").map(PathBuf::from))
            .unwrap_or_else(|| state_dir.join("vault.db"));
        Self { state_dir, db_path }
    }
}

pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultsync")
}

pub fn open_vault(db_path: &Path) -> Result<VaultService, CliError> {
    Ok(VaultService::open_path(db_path)?)
}

pub type HttpOrchestrator = SyncOrchestrator<HttpRemoteVault, XChaChaVaultCipher>;

/// Wire the vault to the configured server.
pub fn build_orchestrator(
    service: VaultService,
    config: &SyncConfig,
    state_dir: &Path,
) -> Result<HttpOrchestrator, CliError> {
    let api_url = config
        .api_base_url
        .clone()
        .ok_or(CliError::SyncNotConfigured)?;
    let token = session::load_token(env::var("VAULTSYNC_TOKEN").ok(), state_dir)?
        .ok_or(CliError::MissingToken)?;
    let cipher = resolve_vault_key(env::var("VAULTSYNC_VAULT_KEY").ok())?;
    let remote = HttpRemoteVault::new(api_url, token)?;
    Ok(SyncOrchestrator::new(service, remote, cipher, config.clone()))
}

pub fn resolve_vault_key(raw: Option<String>) -> Result<XChaChaVaultCipher, CliError> {
    let raw = normalize_text_option(raw).ok_or(CliError::MissingVaultKey)?;
    Ok(XChaChaVaultCipher::from_hex(&raw)?)
}

/// Parse `name=value` pairs into row columns.
pub fn parse_assignments(assignments: &[String]) -> Result<Columns, CliError> {
    let mut columns = Columns::new();
    for assignment in assignments {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| CliError::InvalidAssignment(assignment.clone()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::InvalidAssignment(assignment.clone()));
        }
        columns.insert(name.to_string(), parse_value(raw));
    }
    Ok(columns)
}

/// JSON scalars and documents are kept typed; anything else is text.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Debug, Serialize)]
pub struct RowListItem {
    pub id: String,
    pub updated_at: Option<i64>,
    pub updated_at_iso: Option<String>,
    pub is_deleted: bool,
    pub columns: Columns,
}

pub fn row_to_list_item(row: &SyncableRow) -> RowListItem {
    RowListItem {
        id: row.id.clone(),
        updated_at: row.updated_at,
        updated_at_iso: row.updated_at.map(format_sync_timestamp),
        is_deleted: row.is_deleted,
        columns: row.columns.clone(),
    }
}

pub fn format_row_lines(rows: &[SyncableRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            let updated = row
                .updated_at
                .map_or_else(|| "-".to_string(), format_sync_timestamp);
            let marker = if row.is_deleted { "  [deleted]" } else { "" };
            let columns = serde_json::to_string(&row.columns).unwrap_or_default();
            format!("{}  {}  {}{}", row.id, updated, columns, marker)
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
