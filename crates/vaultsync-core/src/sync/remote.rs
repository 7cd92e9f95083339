//! Server side of a sync exchange.

use thiserror::Error;

/// Errors returned by a `RemoteVault`.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Vault server HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vault server rejected the session")]
    Unauthorized,
    #[error("Vault server revision moved to {current}")]
    RevisionConflict { current: i64 },
    #[error("Vault server holds no vault")]
    NotFound,
    #[error("Vault server API error: {0}")]
    Api(String),
    #[error("Invalid vault server payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Current server revision, fetched before deciding what to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRevision {
    /// 0 when the server holds no vault
    pub revision: i64,
    pub schema_version: Option<String>,
}

/// The server's sealed vault.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteVaultBlob {
    pub revision: i64,
    pub schema_version: String,
    pub blob: Vec<u8>,
}

impl std::fmt::Debug for RemoteVaultBlob {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteVaultBlob")
            .field("revision", &self.revision)
            .field("schema_version", &self.schema_version)
            .field("blob_len", &self.blob.len())
            .finish()
    }
}

/// A sealed vault to store on the server.
///
/// The server must refuse it unless its revision still equals
/// `expected_revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultUpload {
    pub expected_revision: i64,
    pub schema_version: String,
    pub blob: Vec<u8>,
}

/// Whole-vault transport with a single server-assigned revision.
#[allow(async_fn_in_trait)]
pub trait RemoteVault {
    async fn fetch_revision(&self) -> RemoteResult<RemoteRevision>;

    async fn pull(&self) -> RemoteResult<RemoteVaultBlob>;

    /// Store a new vault and return the revision the server assigned to it.
    async fn push(&self, upload: VaultUpload) -> RemoteResult<i64>;
}
