//! Sync failure taxonomy.

use thiserror::Error;

use super::remote::RemoteError;
use crate::compat::IncompatibleVersion;
use crate::crypto::CipherError;
use crate::merge::MergeError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A sync is already in progress")]
    AlreadySyncing,
    #[error("Sync is paused while offline; changes stay pending")]
    Offline,
    #[error(transparent)]
    Incompatible(#[from] IncompatibleVersion),
    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("Server revision kept moving; gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("Session expired or was revoked; sign in again")]
    Unauthorized,
    #[error("Remote error: {0}")]
    Remote(RemoteError),
    #[error("Local store error: {0}")]
    Storage(#[from] crate::Error),
    #[error("Vault blob error: {0}")]
    Cipher(#[from] CipherError),
}

impl From<RemoteError> for SyncError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Unauthorized => Self::Unauthorized,
            other => Self::Remote(other),
        }
    }
}

impl SyncError {
    /// Failures expected to clear up on a later attempt with no user action.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::AlreadySyncing | Self::RetriesExhausted { .. } | Self::Storage(_) => true,
            Self::Remote(remote) => !matches!(remote, RemoteError::InvalidConfiguration(_)),
            _ => false,
        }
    }

    /// The session must be cleared and re-established.
    pub const fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// No further sync can succeed until the user acts.
    pub const fn blocks_sync(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Incompatible(_))
    }

    /// Conditions worth a visible banner rather than a log line.
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::Incompatible(_) | Self::Offline)
    }

    /// Shape errors point at corrupt data, not a bad network.
    pub const fn is_data_integrity(&self) -> bool {
        matches!(self, Self::Merge(_) | Self::Cipher(_))
    }
}
