//! vaultsync CLI - manage and sync an encrypted vault from the terminal

mod cli;
mod commands;
mod error;
mod session;
#[cfg(test)]
mod tests;

use clap::Parser;
use vaultsync_core::config::SyncConfig;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::check_version::run_check_version;
use crate::commands::common::Paths;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::merge::run_merge;
use crate::commands::offline::run_offline;
use crate::commands::put::run_put;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::wipe::run_wipe;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("vaultsync=info,vaultsync_core=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = Paths::resolve(cli.db_path, cli.state_dir);

    match cli.command {
        Commands::Put {
            table,
            id,
            assignments,
        } => {
            run_put(table, id.as_deref(), &assignments, &paths.db_path).await?;
        }
        Commands::Delete { table, id } => run_delete(table, &id, &paths.db_path).await?,
        Commands::List {
            table,
            json,
            include_deleted,
        } => run_list(table, json, include_deleted, &paths.db_path).await?,
        Commands::Sync { watch } => {
            let config = SyncConfig::from_env()?;
            run_sync(watch, &paths, &config).await?;
        }
        Commands::Status { json } => {
            let config = SyncConfig::from_env()?;
            run_status(json, &paths, &config).await?;
        }
        Commands::Offline { mode } => run_offline(mode, &paths.db_path).await?,
        Commands::Merge {
            local,
            server,
            json,
        } => run_merge(&local, &server, json)?,
        Commands::CheckVersion { version } => run_check_version(&version)?,
        Commands::Login { token } => run_login(&token, &paths.state_dir)?,
        Commands::Logout => run_logout(&paths.state_dir, &paths.db_path).await?,
        Commands::Wipe { yes } => run_wipe(yes, &paths.db_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
