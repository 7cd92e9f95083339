pub mod auth_cmd;
pub mod check_version;
pub mod common;
pub mod completions;
pub mod delete;
pub mod list;
pub mod merge;
pub mod offline;
pub mod put;
pub mod status;
pub mod sync;
pub mod wipe;
