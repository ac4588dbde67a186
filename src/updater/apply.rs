//! Rollout Applier.
//!
//! ```text
//! Idle → Staging → Swapping → Applied
//!           ↓
//!         Failed (staging discarded, live install untouched)
//! ```
//!
//! Staging syncs the target version into a hidden directory inside the
//! rollback history. Only a complete sync may proceed to swapping. The swap
//! promotes the staged tree to `Versions/<target>`, clears the live install
//! and copies the new tree into it. It runs on the blocking pool, so dropping
//! the apply future once swapping has begun does not interrupt it.

use super::history::RollbackHistory;
use super::sync::{SyncEngine, SyncReport};
use super::{ProgressSink, ReleaseSource};
use crate::core::{Result, RolloutError};
use crate::utils::fs::{
    StagingDir, clear_dir, copy_dir, is_empty_dir, move_dir, remove_dir_all, run_blocking,
};
use crate::version::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Phase of an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    /// Nothing started.
    Idle,
    /// Syncing files into staging; safe to abort.
    Staging,
    /// Replacing the live install; must complete.
    Swapping,
    /// The target version is live.
    Applied,
    /// The apply stopped.
    Failed,
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Staging => "staging",
            Self::Swapping => "swapping",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Version that was live before.
    pub from: Version,
    /// Version now live.
    pub to: Version,
    /// Per-file results of the sync.
    pub report: SyncReport,
    /// Whether a rollback copy of `from` was captured first.
    pub backed_up: bool,
    /// History copies evicted after the swap.
    pub evicted: Vec<Version>,
}

/// Applies one version to one install path.
#[derive(Debug)]
pub struct RolloutApplier<'a, S> {
    source: &'a S,
    history: RollbackHistory,
    retention: usize,
    concurrency: usize,
    state: ApplyState,
}

impl<'a, S: ReleaseSource> RolloutApplier<'a, S> {
    /// New applier in the [`ApplyState::Idle`] state.
    pub fn new(
        source: &'a S,
        history: RollbackHistory,
        retention: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            history,
            retention,
            concurrency,
            state: ApplyState::Idle,
        }
    }

    /// Current phase.
    pub const fn state(&self) -> ApplyState {
        self.state
    }

    /// The rollback history this applier maintains.
    pub const fn history(&self) -> &RollbackHistory {
        &self.history
    }

    /// Replaces the live install of `installed` with `target`.
    ///
    /// # Errors
    ///
    /// - [`RolloutError::PartialSync`] if any file could not be staged; the
    ///   live install is untouched
    /// - network errors fetching the manifest, I/O errors while staging
    /// - I/O errors while swapping, which leave the install inconsistent
    ///   (logged at error level); the target copy in the history is intact
    pub async fn apply(
        &mut self,
        program: &str,
        installed: &Version,
        target: &Version,
        install_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ApplyOutcome> {
        self.transition(ApplyState::Staging);
        let staged = match self.stage(program, installed, target, install_dir, sink).await {
            Ok(staged) => staged,
            Err(e) => {
                self.transition(ApplyState::Failed);
                return Err(e);
            }
        };

        self.transition(ApplyState::Swapping);
        let target_dir = self.history.version_dir(target);
        let live = install_dir.to_path_buf();
        let staged_dir = staged.dir.clone();
        let swapped = run_blocking(move || swap(&staged_dir, &target_dir, &live)).await;
        if let Err(e) = swapped {
            error!(
                "Swap of {} to {} failed, install at {} may be inconsistent: {}",
                program,
                target,
                install_dir.display(),
                e
            );
            self.transition(ApplyState::Failed);
            return Err(e);
        }
        self.transition(ApplyState::Applied);

        let evicted = self.history.prune(self.retention, target).await?;
        info!("Applied {} {} to {}", program, target, install_dir.display());
        Ok(ApplyOutcome {
            from: *installed,
            to: *target,
            report: staged.report,
            backed_up: staged.backed_up,
            evicted,
        })
    }

    async fn stage(
        &self,
        program: &str,
        installed: &Version,
        target: &Version,
        install_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<Staged> {
        self.history.ensure().await?;
        self.history.clean_staging().await?;

        if self.history.contains(target).await {
            debug!("Discarding stale history copy of {} {}", program, target);
            self.history.remove(target).await?;
        }

        let has_install = install_dir.is_dir() && !is_empty_dir(install_dir);
        let backed_up = has_install && self.history.capture(installed, install_dir).await?;

        let manifest = self.source.manifest(program, target).await?;
        let staging = StagingDir::new_in(self.history.dir(), &target.to_string())?;

        let report = SyncEngine::new(self.source, self.concurrency)
            .sync(program, target, &manifest, install_dir, staging.path(), sink)
            .await;
        report.ensure_complete()?;

        Ok(Staged {
            dir: staging.keep(),
            report,
            backed_up,
        })
    }

    fn transition(&mut self, next: ApplyState) {
        debug!("Apply state {} -> {}", self.state, next);
        self.state = next;
    }
}

struct Staged {
    dir: PathBuf,
    report: SyncReport,
    backed_up: bool,
}

fn swap(staged: &Path, target_dir: &Path, live: &Path) -> Result<()> {
    if let Err(e) = move_dir(staged, target_dir) {
        // Nothing live was touched yet
        remove_dir_all(staged)?;
        return Err(e);
    }
    clear_dir(live)?;
    copy_dir(target_dir, live).map_err(|e| match e {
        RolloutError::Io {
            operation,
            path,
            reason,
        } => RolloutError::Io {
            operation: format!("populate install ({operation})"),
            path,
            reason,
        },
        other => other,
    })?;
    Ok(())
}
