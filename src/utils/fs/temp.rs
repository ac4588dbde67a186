//! Private staging directories with automatic cleanup.

use crate::constants::STAGING_PREFIX;
use crate::core::Result;
use crate::utils::fs::dirs::{ensure_dir, remove_dir_all};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A uniquely named, hidden working directory that is removed on drop.
///
/// Staging directories are created next to their final destination so that
/// promoting them is a same-filesystem rename. Their names start with
/// [`STAGING_PREFIX`] and never parse as a version, which keeps them out of
/// every registry and history enumeration.
///
/// Call [`StagingDir::keep`] once the contents have been promoted (moved away)
/// or should otherwise survive; until then, dropping the value (including
/// through an early `?` return) deletes the directory and its contents.
///
/// # Examples
///
/// ```rust,no_run
/// use rollout::utils::fs::StagingDir;
/// use std::path::Path;
///
/// # fn example() -> rollout::core::Result<()> {
/// let staging = StagingDir::new_in(Path::new("programs/Editor"), "1.0.0.1")?;
/// std::fs::write(staging.path().join("changelog.txt"), "fixes").ok();
/// // staging is removed here unless `keep()` is called
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    armed: bool,
}

impl StagingDir {
    /// Create `parent/.staging-{label}-{uuid}`.
    pub fn new_in(parent: &Path, label: &str) -> Result<Self> {
        let unique_name = format!("{STAGING_PREFIX}-{label}-{}", uuid::Uuid::new_v4());
        let path = parent.join(unique_name);

        ensure_dir(&path)?;

        Ok(Self {
            path,
            armed: true,
        })
    }

    /// Returns the path to the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm cleanup and return the path.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = remove_dir_all(&self.path)
        {
            warn!("Failed to clean up staging directory {}: {}", self.path.display(), e);
        }
    }
}
