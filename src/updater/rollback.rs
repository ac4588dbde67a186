//! Restoring a retained version into the live install.

use super::history::RollbackHistory;
use crate::core::{Result, RolloutError};
use crate::utils::fs::{clear_dir, copy_dir, run_blocking};
use crate::version::Version;
use std::path::Path;
use tracing::info;

/// Replaces the live install with the history copy of `version`.
///
/// Uses the same clear-then-copy swap as an update. The history itself is not
/// modified. Returns the number of files restored.
pub async fn rollback(
    history: &RollbackHistory,
    program: &str,
    version: &Version,
    install_dir: &Path,
) -> Result<u64> {
    if !history.contains(version).await {
        return Err(RolloutError::VersionNotFound {
            program: program.to_string(),
            version: version.to_string(),
        });
    }

    let source = history.version_dir(version);
    let live = install_dir.to_path_buf();
    let restored = run_blocking(move || {
        clear_dir(&live)?;
        copy_dir(&source, &live)
    })
    .await?;

    info!("Rolled {} back to {} ({} files)", program, version, restored);
    Ok(restored)
}
