use std::path::Path;

use vaultsync_core::TableKind;

use crate::commands::common::open_vault;
use crate::error::CliError;

pub async fn run_delete(table: TableKind, id: &str, db_path: &Path) -> Result<(), CliError> {
    let vault = open_vault(db_path)?;
    let row = vault.soft_delete_row(table, id.trim()).await?;
    println!("Deleted {table}/{}", row.id);
    Ok(())
}
