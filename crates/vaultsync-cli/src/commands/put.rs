use std::path::Path;

use vaultsync_core::TableKind;

use crate::commands::common::{open_vault, parse_assignments};
use crate::error::CliError;

pub async fn run_put(
    table: TableKind,
    id: Option<&str>,
    assignments: &[String],
    db_path: &Path,
) -> Result<String, CliError> {
    let columns = parse_assignments(assignments)?;
    let vault = open_vault(db_path)?;
    let row = vault.put_row(table, id, columns).await?;
    println!("{}", row.id);
    Ok(row.id)
}
