use std::io;

use thiserror::Error;
use vaultsync_core::compat::IncompatibleVersion;
use vaultsync_core::config::ConfigError;
use vaultsync_core::crypto::CipherError;
use vaultsync_core::sync::{RemoteError, SyncError};
use vaultsync_core::MergeError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] vaultsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Incompatible(#[from] IncompatibleVersion),
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("Vault server configuration error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Invalid VAULTSYNC_VAULT_KEY: {0}")]
    VaultKey(#[from] CipherError),
    #[error("Invalid column assignment `{0}` (expected NAME=VALUE)")]
    InvalidAssignment(String),
    #[error("Failed to read snapshot {path}: {message}")]
    Snapshot { path: String, message: String },
    #[error("Sync is not configured. Set VAULTSYNC_API_URL to the vault server URL.")]
    SyncNotConfigured,
    #[error("No session token. Run `vaultsync login --token <TOKEN>` or set VAULTSYNC_TOKEN.")]
    MissingToken,
    #[error("VAULTSYNC_VAULT_KEY is not set (expected 64 hex characters)")]
    MissingVaultKey,
    #[error("Session expired; the stored token was cleared. Log in again to resume syncing.")]
    SessionExpired,
    #[error("Refusing to wipe without --yes")]
    ConfirmationRequired,
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}
