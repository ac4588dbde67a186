//! Client-side update pipeline.
//!
//! One update cycle is `check → sync → apply`:
//!
//! 1. [`negotiator::check_for_update`] asks the server for the latest version
//!    and decides whether it is strictly newer than the installed one.
//! 2. [`sync::SyncEngine`] resolves every manifest entry to REUSE (the local
//!    copy already has the right hash) or FETCH and fills a staging directory.
//! 3. [`apply::RolloutApplier`] swaps the staged tree into the live install
//!    path and prunes the [`history::RollbackHistory`].
//!
//! [`Updater`] drives cycles from an [`trigger::UpdateTrigger`]. A failed
//! cycle is logged and the loop keeps running.

pub mod apply;
pub mod history;
pub mod negotiator;
pub mod rollback;
pub mod sync;
pub mod trigger;

pub use apply::{ApplyOutcome, ApplyState, RolloutApplier};
pub use history::RollbackHistory;
pub use negotiator::{UpdateCheck, check_for_update};
pub use sync::{FileEvent, FileOutcome, SyncEngine, SyncReport};
pub use trigger::{IntervalTrigger, LineTrigger, ManualTrigger, ManualTriggerHandle, UpdateTrigger};

use crate::client::ServerClient;
use crate::core::Result;
use crate::manifest::Manifest;
use crate::version::Version;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Where releases come from.
///
/// Implemented by [`ServerClient`]; tests substitute an in-memory source.
pub trait ReleaseSource: Send + Sync {
    /// Latest published version of `program`.
    fn latest_version(&self, program: &str) -> impl Future<Output = Result<Version>> + Send;

    /// Manifest of a published version.
    fn manifest(
        &self,
        program: &str,
        version: &Version,
    ) -> impl Future<Output = Result<Manifest>> + Send;

    /// Downloads one file of a published version into `dest`.
    fn fetch_file(
        &self,
        program: &str,
        version: &Version,
        relative_path: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<u64>> + Send;
}

impl ReleaseSource for ServerClient {
    async fn latest_version(&self, program: &str) -> Result<Version> {
        ServerClient::latest_version(self, program).await
    }

    async fn manifest(&self, program: &str, version: &Version) -> Result<Manifest> {
        ServerClient::manifest(self, program, version).await
    }

    async fn fetch_file(
        &self,
        program: &str,
        version: &Version,
        relative_path: &str,
        dest: &Path,
    ) -> Result<u64> {
        self.download_file(program, version, relative_path, dest).await
    }
}

/// Receives per-file outcomes of a sync pass.
pub trait ProgressSink: Send + Sync {
    /// A sync pass over `total` entries is starting.
    fn sync_started(&self, _version: &Version, _total: usize) {}

    /// One entry finished.
    fn file_done(&self, event: &FileEvent<'_>);

    /// The pass finished.
    fn sync_finished(&self, _report: &SyncReport) {}
}

/// Sink that only logs at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn file_done(&self, event: &FileEvent<'_>) {
        tracing::debug!("{} {}", event.outcome, event.path);
    }
}

/// What the client believes is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledState {
    /// Program name.
    pub program: String,
    /// Version currently applied to `install_path`.
    pub version: Version,
    /// Live install directory.
    pub install_path: PathBuf,
}

/// Tuning for the update loop.
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    /// Rollback history directory of the program.
    pub history_dir: PathBuf,
    /// Number of versions kept in the history.
    pub retention: usize,
    /// Maximum concurrent file operations during sync.
    pub max_parallel: usize,
}

/// Result of one cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The installed version is current (or newer than the server's).
    UpToDate {
        /// Latest version the server reported.
        latest: Version,
    },
    /// The check failed softly; nothing was changed.
    Undetermined,
    /// A newer version was applied.
    Updated(ApplyOutcome),
}

/// Runs update cycles for one install.
#[derive(Debug)]
pub struct Updater<S> {
    source: S,
    state: InstalledState,
    settings: UpdaterSettings,
}

impl<S: ReleaseSource> Updater<S> {
    /// New updater for `state`.
    pub fn new(source: S, state: InstalledState, settings: UpdaterSettings) -> Self {
        Self {
            source,
            state,
            settings,
        }
    }

    /// Currently installed state.
    pub const fn installed(&self) -> &InstalledState {
        &self.state
    }

    /// The release source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// One `check → sync → apply` cycle.
    ///
    /// On success with [`CycleOutcome::Updated`] the installed version advances.
    pub async fn run_cycle(&mut self, sink: &dyn ProgressSink) -> Result<CycleOutcome> {
        let check = check_for_update(&self.source, &self.state.program, &self.state.version).await;
        let Some(latest) = check.latest else {
            return Ok(CycleOutcome::Undetermined);
        };
        if !check.needed {
            return Ok(CycleOutcome::UpToDate { latest });
        }

        let mut applier = RolloutApplier::new(
            &self.source,
            RollbackHistory::new(&self.settings.history_dir),
            self.settings.retention,
            self.settings.max_parallel,
        );
        let outcome = applier
            .apply(
                &self.state.program,
                &self.state.version,
                &latest,
                &self.state.install_path,
                sink,
            )
            .await?;
        self.state.version = outcome.to;
        Ok(CycleOutcome::Updated(outcome))
    }

    /// Runs a cycle every time `trigger` fires until it is exhausted.
    ///
    /// Cycle failures are logged; they never stop the loop.
    pub async fn run(&mut self, trigger: &mut impl UpdateTrigger, sink: &dyn ProgressSink) {
        while trigger.next().await {
            match self.run_cycle(sink).await {
                Ok(CycleOutcome::Updated(outcome)) => {
                    info!(
                        "Updated {} from {} to {} ({} fetched, {} reused)",
                        self.state.program,
                        outcome.from,
                        outcome.to,
                        outcome.report.fetched.len(),
                        outcome.report.reused.len()
                    );
                }
                Ok(CycleOutcome::UpToDate { latest }) => {
                    info!(
                        "{} {} is up to date (server latest {})",
                        self.state.program, self.state.version, latest
                    );
                }
                Ok(CycleOutcome::Undetermined) => {
                    info!("Could not determine whether {} needs an update", self.state.program);
                }
                Err(e) => {
                    error!("Update cycle for {} failed: {}", self.state.program, e);
                }
            }
        }
    }
}
