use std::path::Path;

use crate::cli::Toggle;
use crate::commands::common::open_vault;
use crate::error::CliError;

pub async fn run_offline(mode: Toggle, db_path: &Path) -> Result<(), CliError> {
    let vault = open_vault(db_path)?;
    let state = vault.set_offline(mode == Toggle::On).await?;
    if state.is_offline {
        println!("Sync paused; local changes will be kept until you go back online.");
    } else {
        println!("Sync resumed.");
    }
    Ok(())
}
