use std::path::Path;

use crate::commands::common::open_vault;
use crate::error::CliError;

pub async fn run_wipe(confirmed: bool, db_path: &Path) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }
    let vault = open_vault(db_path)?;
    vault.wipe().await?;
    println!("Local vault wiped");
    Ok(())
}
