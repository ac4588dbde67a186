//! File system utilities for the program store and the client install tree.
//!
//! # Key Features
//!
//! - **Atomic writes**: manifests are written via temp file + rename
//! - **Staging directories**: hidden, uniquely named, removed on drop unless kept
//! - **Tree operations**: copy, clear, move with a cross-device fallback
//!
//! # Examples
//!
//! ```rust,no_run
//! use rollout::utils::fs::{StagingDir, atomic_write, ensure_dir, move_dir};
//! use std::path::Path;
//!
//! # fn example() -> rollout::core::Result<()> {
//! let program_dir = Path::new("programs/Editor");
//! ensure_dir(program_dir)?;
//!
//! let staging = StagingDir::new_in(program_dir, "1.0.0.1")?;
//! atomic_write(&staging.path().join("changelog.txt"), b"Initial release")?;
//! move_dir(staging.path(), &program_dir.join("1.0.0.1"))?;
//! staging.keep();
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;
pub mod temp;

pub use atomic::atomic_write;
pub use dirs::{
    TreeSummary, clear_dir, copy_dir, ensure_dir, ensure_parent_dir, is_empty_dir, move_dir,
    remove_dir_all, tree_summary,
};
pub use temp::StagingDir;

use crate::core::{Result, RolloutError};

/// Runs blocking file system work on the blocking pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| RolloutError::Other {
        message: format!("Task join error: {e}"),
    })?
}
