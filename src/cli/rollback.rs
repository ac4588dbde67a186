//! Restore a retained version.

use super::CliConfig;
use crate::constants::HISTORY_DIR;
use crate::updater::RollbackHistory;
use crate::updater::rollback::rollback;
use crate::utils::path_validation::validate_program_name;
use crate::version::Version;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Command to roll an install back to a version kept in the local history.
#[derive(Args, Debug)]
pub struct RollbackCommand {
    /// Program name
    program: String,

    /// Version to restore; omit with `--list`
    #[arg(required_unless_present = "list")]
    version: Option<Version>,

    /// Live install directory
    #[arg(required_unless_present = "list")]
    install_path: Option<PathBuf>,

    /// List the retained versions instead
    #[arg(long)]
    list: bool,
}

impl RollbackCommand {
    /// Restores the version, or lists the history.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        validate_program_name(&self.program)?;
        let client_config = config.client_config().await?;
        let history =
            RollbackHistory::new(client_config.program_data_dir(&self.program)?.join(HISTORY_DIR));

        if self.list {
            let versions = history.versions().await?;
            if versions.is_empty() {
                println!("No retained versions of {}", self.program);
            }
            for version in versions.iter().rev() {
                println!("{version}");
            }
            return Ok(());
        }

        let (Some(version), Some(install_path)) = (self.version, self.install_path) else {
            anyhow::bail!("A version and an install path are required");
        };
        let restored = rollback(&history, &self.program, &version, &install_path).await?;
        println!(
            "{} Restored {} {} into {} ({} files)",
            "✓".green(),
            self.program,
            version,
            install_path.display(),
            restored
        );
        Ok(())
    }
}
