use std::path::Path;

use vaultsync_core::TableKind;

use crate::commands::common::{format_row_lines, open_vault, row_to_list_item, RowListItem};
use crate::error::CliError;

pub async fn run_list(
    table: TableKind,
    as_json: bool,
    include_deleted: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let vault = open_vault(db_path)?;
    let rows = vault.list_rows(table, include_deleted).await?;

    if as_json {
        let json_items = rows
            .iter()
            .map(row_to_list_item)
            .collect::<Vec<RowListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if rows.is_empty() {
        println!("No rows in {table}.");
    } else {
        for line in format_row_lines(&rows) {
            println!("{line}");
        }
    }

    Ok(())
}
