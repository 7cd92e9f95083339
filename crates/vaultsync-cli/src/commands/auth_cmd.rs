use std::path::Path;

use crate::commands::common::open_vault;
use crate::error::CliError;
use crate::session;

pub fn run_login(token: &str, state_dir: &Path) -> Result<(), CliError> {
    session::save_token(state_dir, token)?;
    println!("Session token stored in the system keychain");
    Ok(())
}

/// Forget the session and wipe the local vault so the next account starts clean.
///
/// A session the server revoked is cleared by `sync` instead, which keeps the vault.
pub async fn run_logout(state_dir: &Path, db_path: &Path) -> Result<(), CliError> {
    let had_session = session::clear_token(state_dir)?;
    open_vault(db_path)?.wipe().await?;
    if had_session {
        println!("Logged out; local vault wiped.");
    } else {
        println!("No stored session; local vault wiped.");
    }
    Ok(())
}
