//! vaultsync-core - Core library for vaultsync
//!
//! Offline-first synchronization of an encrypted, table-structured vault
//! against a server that stores the whole vault as one opaque blob with a
//! single revision number. Contains the entity registry, merge engine,
//! version compatibility checks, local store and sync orchestrator used by
//! the `vaultsync` CLI and the `vaultsync-api` server.

pub mod compat;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod registry;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use merge::{merge, ChangeScript, MergeError, MergeOutcome, MergeRequest, MergeStatistics};
pub use models::{SyncState, SyncableRow, TableSnapshot, VaultSnapshot};
pub use registry::TableKind;
