//! One vault's sync decision loop.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;

use super::error::SyncError;
use super::remote::{RemoteError, RemoteVault, VaultUpload};
use crate::compat;
use crate::config::SyncConfig;
use crate::crypto::{VaultCipher, VaultCodec};
use crate::merge::{merge, validate_tables, MergeOutcome, MergeRequest, Side};
use crate::models::VaultSnapshot;
use crate::services::VaultService;

/// What a sync attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Uploaded,
    Downloaded,
    Merged,
    AlreadyInSync,
    Error,
}

impl SyncOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Downloaded => "downloaded",
            Self::Merged => "merged",
            Self::AlreadyInSync => "already_in_sync",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `SyncOrchestrator::sync`.
#[derive(Debug)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Server revision after the attempt, when it succeeded
    pub revision: Option<i64>,
    /// The attempt was skipped because the vault is offline
    pub was_offline: bool,
    pub error: Option<SyncError>,
    /// Diagnostics for merged outcomes
    pub merge: Option<MergeOutcome>,
}

impl SyncReport {
    const fn success(outcome: SyncOutcome, revision: i64) -> Self {
        Self {
            outcome,
            revision: Some(revision),
            was_offline: false,
            error: None,
            merge: None,
        }
    }

    const fn failed(error: SyncError) -> Self {
        Self {
            outcome: SyncOutcome::Error,
            revision: None,
            was_offline: matches!(error, SyncError::Offline),
            error: Some(error),
            merge: None,
        }
    }

    pub const fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Error)
    }
}

enum Attempt {
    Done(SyncReport),
    /// A local write raced a download; decide again
    Retry,
}

/// Drives sync attempts for one vault against one remote.
pub struct SyncOrchestrator<R, C> {
    service: VaultService,
    remote: R,
    codec: VaultCodec<C>,
    config: SyncConfig,
}

impl<R: RemoteVault, C: VaultCipher> SyncOrchestrator<R, C> {
    pub const fn new(service: VaultService, remote: R, cipher: C, config: SyncConfig) -> Self {
        Self {
            service,
            remote,
            codec: VaultCodec::new(cipher),
            config,
        }
    }

    pub const fn service(&self) -> &VaultService {
        &self.service
    }

    /// Run one sync. Never fails; failures are reported as `SyncOutcome::Error`.
    pub async fn sync(&self) -> SyncReport {
        let Some(_guard) = self.service.tracker().try_begin() else {
            tracing::debug!("Sync skipped: another sync is in flight");
            return SyncReport::failed(SyncError::AlreadySyncing);
        };
        // Checked under the guard; an in-flight sync is reported first.
        if self.service.sync_state().is_offline {
            tracing::info!("Sync skipped: vault is offline");
            return SyncReport::failed(SyncError::Offline);
        }

        match self.run_attempts().await {
            Ok(report) => {
                tracing::info!(
                    outcome = %report.outcome,
                    revision = report.revision,
                    "Sync finished"
                );
                report
            }
            Err(error) => {
                if error.is_data_integrity() {
                    tracing::error!(%error, "Sync aborted on unreadable vault data");
                } else if error.is_transient() {
                    tracing::warn!(%error, "Sync failed; local changes kept for next attempt");
                } else {
                    tracing::error!(%error, "Sync failed");
                }
                SyncReport::failed(error)
            }
        }
    }

    /// Sync every `interval` until `shutdown` resolves.
    ///
    /// Stops early and returns the report when an error blocks further
    /// syncs (expired session, outdated client).
    pub async fn run_periodic(
        &self,
        interval: Duration,
        shutdown: impl Future<Output = ()>,
        mut on_report: impl FnMut(&SyncReport),
    ) -> Option<SyncReport> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!("Periodic sync stopped");
                    return None;
                }
                _ = ticker.tick() => {
                    let report = self.sync().await;
                    on_report(&report);
                    if report.error.as_ref().is_some_and(SyncError::blocks_sync) {
                        return Some(report);
                    }
                }
            }
        }
    }

    async fn run_attempts(&self) -> Result<SyncReport, SyncError> {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.attempt().await {
                Ok(Attempt::Done(report)) => return Ok(report),
                Ok(Attempt::Retry) => {
                    tracing::debug!(attempt, "Local write raced the download; deciding again");
                }
                Err(SyncError::Remote(RemoteError::RevisionConflict { current })) => {
                    tracing::warn!(attempt, current, "Server revision moved during push; retrying");
                }
                Err(error) => return Err(error),
            }
        }
        Err(SyncError::RetriesExhausted { attempts })
    }

    async fn attempt(&self) -> Result<Attempt, SyncError> {
        let state = self.service.sync_state();
        let seq_at_start = state.mutation_sequence;

        let remote = self.remote.fetch_revision().await?;
        if let Some(version) = remote.schema_version.as_deref() {
            compat::ensure_compatible(version)?;
        }
        tracing::debug!(
            local_revision = state.server_revision,
            server_revision = remote.revision,
            is_dirty = state.is_dirty,
            seq_at_start,
            "Fetched server revision"
        );

        if remote.revision == 0 && state.server_revision != 0 {
            tracing::warn!(
                last_seen = state.server_revision,
                "Server holds no vault; re-seeding it from the local copy"
            );
            return self.upload(seq_at_start, 0).await;
        }

        match (state.is_dirty, remote.revision == state.server_revision) {
            (false, true) => Ok(Attempt::Done(SyncReport::success(
                SyncOutcome::AlreadyInSync,
                remote.revision,
            ))),
            (false, false) => self.download(seq_at_start).await,
            (true, true) => self.upload(seq_at_start, remote.revision).await,
            (true, false) => self.merge_and_push(seq_at_start).await,
        }
    }

    async fn upload(&self, seq_at_start: u64, expected_revision: i64) -> Result<Attempt, SyncError> {
        let vault = self.service.snapshot().await?;
        compat::ensure_compatible(&vault.schema_version)?;

        let revision = self.push(&vault, expected_revision).await?;
        self.service
            .complete_push(seq_at_start, revision, &vault.schema_version)
            .await?;
        tracing::debug!(rows = vault.row_count(), revision, "Uploaded vault");
        Ok(Attempt::Done(SyncReport::success(
            SyncOutcome::Uploaded,
            revision,
        )))
    }

    async fn download(&self, seq_at_start: u64) -> Result<Attempt, SyncError> {
        let (revision, vault) = self.pull().await?;
        // Replaced wholesale below, so nothing is written unless every row is well formed.
        validate_tables(Side::Server, &vault.tables)?;
        if !self
            .service
            .replace_if_unchanged(&vault, revision, seq_at_start)
            .await?
        {
            return Ok(Attempt::Retry);
        }
        tracing::debug!(rows = vault.row_count(), revision, "Downloaded vault");
        Ok(Attempt::Done(SyncReport::success(
            SyncOutcome::Downloaded,
            revision,
        )))
    }

    async fn merge_and_push(&self, seq_at_start: u64) -> Result<Attempt, SyncError> {
        let (server_revision, server_vault) = self.pull().await?;
        let local = self.service.snapshot().await?;
        compat::ensure_compatible(&local.schema_version)?;

        let outcome = merge(&MergeRequest::new(local.tables, server_vault.tables))?;
        let written = self
            .service
            .apply_change_script(&outcome.script, &server_vault.schema_version)
            .await?;
        tracing::info!(
            tables = outcome.stats.tables_processed,
            conflicts = outcome.stats.conflicts,
            from_local = outcome.stats.records_from_local,
            from_server = outcome.stats.records_from_server,
            created_locally = outcome.stats.records_created_locally,
            inserted = outcome.stats.records_inserted,
            written,
            "Merged local vault with server revision {server_revision}"
        );

        let merged = self.service.snapshot().await?;
        let revision = self.push(&merged, server_revision).await?;
        self.service
            .complete_push(seq_at_start, revision, &merged.schema_version)
            .await?;

        let mut report = SyncReport::success(SyncOutcome::Merged, revision);
        report.merge = Some(outcome);
        Ok(Attempt::Done(report))
    }

    async fn pull(&self) -> Result<(i64, VaultSnapshot), SyncError> {
        let pulled = self.remote.pull().await?;
        compat::ensure_compatible(&pulled.schema_version)?;
        let vault = self.codec.decode(&pulled.blob)?;
        compat::ensure_compatible(&vault.schema_version)?;
        Ok((pulled.revision, vault))
    }

    async fn push(&self, vault: &VaultSnapshot, expected_revision: i64) -> Result<i64, SyncError> {
        let blob = self.codec.encode(vault)?;
        let revision = self
            .remote
            .push(VaultUpload {
                expected_revision,
                schema_version: vault.schema_version.clone(),
                blob,
            })
            .await?;
        Ok(revision)
    }
}
