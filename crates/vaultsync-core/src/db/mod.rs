//! Local vault store

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{SqliteVaultRepository, VaultRepository, VAULT_VERSION_KEY};
