//! Vault synchronization against a single-revision server.
//!
//! `SyncOrchestrator` decides per attempt whether to upload, download, or
//! merge, based on the local `SyncState` and the server's current revision.

mod error;
mod http;
mod orchestrator;
mod remote;
mod state;
pub mod wire;

pub use error::SyncError;
pub use http::HttpRemoteVault;
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncReport};
pub use remote::{
    RemoteError, RemoteResult, RemoteRevision, RemoteVault, RemoteVaultBlob, VaultUpload,
};
pub use state::{SyncGuard, SyncStateTracker};
