//! Service layer shared by clients.

mod vault;

pub use vault::VaultService;
