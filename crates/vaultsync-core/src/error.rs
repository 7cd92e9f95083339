//! Error types for vaultsync-core

use thiserror::Error;

use crate::crypto::CipherError;

/// Result type alias using vaultsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in local vault operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row not found
    #[error("Row not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Vault blob could not be sealed or opened
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),
}
