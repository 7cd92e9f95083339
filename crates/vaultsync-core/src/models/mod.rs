//! Data models for vaultsync

mod row;
mod snapshot;
mod sync_state;

pub use row::{new_row_id, Columns, SyncableRow};
pub use snapshot::{TableSnapshot, VaultSnapshot};
pub use sync_state::SyncState;
