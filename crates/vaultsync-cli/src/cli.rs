use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use vaultsync_core::TableKind;

#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(about = "Keep an encrypted local vault in sync with its server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local vault database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory for the vault database; also keys the stored session
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a row or update columns of an existing one
    Put {
        /// Table name (e.g. items, folders, tags)
        #[arg(value_parser = parse_table)]
        table: TableKind,
        /// Row id (a new id is generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Column assignment `name=value`; JSON values are parsed, anything else is text
        #[arg(long = "set", value_name = "NAME=VALUE")]
        assignments: Vec<String>,
    },
    /// Soft-delete a row
    Delete {
        #[arg(value_parser = parse_table)]
        table: TableKind,
        id: String,
    },
    /// List rows of a table
    List {
        #[arg(value_parser = parse_table)]
        table: TableKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Include soft-deleted rows
        #[arg(long)]
        include_deleted: bool,
    },
    /// Sync the local vault with the server
    Sync {
        /// Keep syncing every SECS seconds until interrupted
        /// (bare flag uses VAULTSYNC_SYNC_INTERVAL_SECS or 60)
        #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "0")]
        watch: Option<u64>,
    },
    /// Show sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suspend or resume syncing
    Offline {
        #[arg(value_enum)]
        mode: Toggle,
    },
    /// Merge two plaintext vault snapshot files and print the result
    Merge {
        /// Local snapshot JSON file
        #[arg(long, value_name = "FILE")]
        local: PathBuf,
        /// Server snapshot JSON file
        #[arg(long, value_name = "FILE")]
        server: PathBuf,
        /// Output the change script and statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a vault schema version is supported
    CheckVersion { version: String },
    /// Store a session token for the vault server in the system keychain
    Login {
        #[arg(long, value_name = "TOKEN")]
        token: String,
    },
    /// Forget the stored session token and wipe the local vault
    Logout,
    /// Delete every local row and reset sync state
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn parse_table(raw: &str) -> Result<TableKind, String> {
    raw.parse::<TableKind>().map_err(|_| {
        let names = TableKind::ALL
            .iter()
            .map(|table| table.name())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown table `{raw}` (expected one of: {names})")
    })
}
