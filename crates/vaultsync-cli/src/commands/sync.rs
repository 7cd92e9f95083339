use std::path::Path;
use std::time::Duration;

use vaultsync_core::config::SyncConfig;
use vaultsync_core::sync::{SyncOutcome, SyncReport};

use crate::commands::common::{build_orchestrator, open_vault, Paths};
use crate::error::CliError;
use crate::session;

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(60);

pub async fn run_sync(watch: Option<u64>, paths: &Paths, config: &SyncConfig) -> Result<(), CliError> {
    let vault = open_vault(&paths.db_path)?;
    let orchestrator = build_orchestrator(vault, config, &paths.state_dir)?;

    let Some(secs) = watch else {
        let report = orchestrator.sync().await;
        println!("{}", format_report_line(&report));
        return finish_report(report, &paths.state_dir);
    };

    let interval = match secs {
        0 => config.sync_interval.unwrap_or(DEFAULT_WATCH_INTERVAL),
        secs => Duration::from_secs(secs),
    };
    println!(
        "Syncing every {}s; press Ctrl-C to stop.",
        interval.as_secs()
    );
    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };
    let stopped = orchestrator
        .run_periodic(interval, shutdown, |report| {
            println!("{}", format_report_line(report));
        })
        .await;

    match stopped {
        Some(report) => finish_report(report, &paths.state_dir),
        None => Ok(()),
    }
}

/// Turn a failed report into the command's error, clearing the session when
/// the server rejected it.
pub fn finish_report(report: SyncReport, state_dir: &Path) -> Result<(), CliError> {
    let Some(error) = report.error else {
        return Ok(());
    };
    if error.requires_reauth() {
        session::clear_token(state_dir)?;
        return Err(CliError::SessionExpired);
    }
    Err(CliError::Sync(error))
}

pub fn format_report_line(report: &SyncReport) -> String {
    match (report.outcome, report.revision) {
        (SyncOutcome::Error, _) => {
            let detail = report
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            if report.was_offline {
                format!("offline: {detail}")
            } else {
                format!("error: {detail}")
            }
        }
        (SyncOutcome::Merged, Some(revision)) => {
            let conflicts = report
                .merge
                .as_ref()
                .map_or(0, |outcome| outcome.stats.conflicts);
            format!("merged (revision {revision}, {conflicts} conflicts)")
        }
        (outcome, Some(revision)) => format!("{outcome} (revision {revision})"),
        (outcome, None) => outcome.to_string(),
    }
}
