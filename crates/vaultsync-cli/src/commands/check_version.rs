use vaultsync_core::compat;

use crate::error::CliError;

pub fn run_check_version(version: &str) -> Result<(), CliError> {
    let result = compat::ensure_compatible(version)?;
    match (result.is_known_version, result.assumed_revision) {
        (true, Some(revision)) => println!("{version}: supported (revision {revision})"),
        (_, Some(revision)) => println!(
            "{version}: supported, newer than this client knows (treated as revision {revision})"
        ),
        (_, None) => println!("{version}: supported"),
    }
    Ok(())
}
