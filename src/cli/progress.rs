//! Terminal rendering of sync progress.

use crate::updater::{FileEvent, FileOutcome, ProgressSink, SyncReport};
use crate::utils::ProgressBar;
use crate::version::Version;
use colored::Colorize;

/// Progress bar over the entries of a sync pass; failed files are printed above it.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Visible unless `no_progress` is set or `ROLLOUT_NO_PROGRESS` is in the environment.
    #[must_use]
    pub fn new(no_progress: bool) -> Self {
        let bar = if no_progress {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        Self {
            bar,
        }
    }
}

impl ProgressSink for CliProgress {
    fn sync_started(&self, version: &Version, total: usize) {
        self.bar.restart(total as u64);
        self.bar.set_prefix(format!("Syncing {version}"));
    }

    fn file_done(&self, event: &FileEvent<'_>) {
        self.bar.inc(1);
        match event.outcome {
            FileOutcome::Failed(reason) => {
                self.bar.println(format!("{} {} ({})", "✗".red(), event.path, reason));
                tracing::debug!("{}: failed: {}", event.path, reason);
            }
            outcome => {
                self.bar.set_message(event.path.to_string());
                tracing::debug!("{}: {}", event.path, outcome);
            }
        }
    }

    fn sync_finished(&self, report: &SyncReport) {
        let summary = format!(
            "{} fetched, {} reused, {} failed",
            report.fetched.len(),
            report.reused.len(),
            report.failed.len()
        );
        if report.is_complete() {
            self.bar.finish_with_message(summary.green().to_string());
        } else {
            self.bar.finish_with_message(summary.red().to_string());
        }
    }
}
