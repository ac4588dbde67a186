//! Progress indicators for long-running CLI operations.
//!
//! Wraps `indicatif` with rollout's styling. Sync passes use a bar sized to
//! the manifest; network round-trips without a known size use a spinner.
//!
//! # Environment Variables
//!
//! - `ROLLOUT_NO_PROGRESS`: Set to any value to disable all progress indicators
//!
//! # Examples
//!
//! ```rust
//! use rollout::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::new(3);
//! progress.set_prefix("Syncing");
//! for file in ["/a.dll", "/b.dll", "/c.dll"] {
//!     progress.set_message(file);
//!     progress.inc(1);
//! }
//! progress.finish_with_message("done");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that hides every progress indicator.
pub const NO_PROGRESS_ENV: &str = "ROLLOUT_NO_PROGRESS";

/// Checks if progress bars should be disabled.
///
/// # Returns
///
/// `true` if `ROLLOUT_NO_PROGRESS` is set to any value
#[must_use]
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar with consistent styling.
///
/// When progress is disabled the bar is created hidden and silently ignores
/// every update, so callers never need to branch on the environment.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a new progress bar tracking `len` units of work.
    #[must_use]
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a spinner for indeterminate work.
    #[must_use]
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Creates a bar that never draws, for embedding and tests.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Sets the message displayed after the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Sets the prefix displayed before the bar.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Resets the bar to track `len` units from zero.
    pub fn restart(&self, len: u64) {
        self.inner.set_length(len);
        self.inner.set_position(0);
    }

    /// Advances the bar by `delta` units.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Prints a line above the bar without corrupting it.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.inner.is_hidden() {
            return;
        }
        self.inner.println(line);
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Finishes the bar, leaving `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finishes the bar and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}
