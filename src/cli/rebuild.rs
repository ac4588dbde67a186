//! Recompute stored manifests.

use super::CliConfig;
use crate::config::ServerConfig;
use crate::registry::Registry;
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Command to rebuild `FilesHash.json` for every version in the store.
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Program store root (overrides the server config)
    #[arg(long)]
    root: Option<PathBuf>,
}

impl RebuildCommand {
    /// Rebuilds all manifests; fails if any version could not be rebuilt.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let server_config = ServerConfig::load(config.config_path.as_deref()).await?;
        let root = self.root.unwrap_or(server_config.root);
        let registry = Registry::new(&root);

        let report = registry.rebuild_all_manifests(server_config.hash_concurrency.max(1)).await?;
        for (program, version) in &report.rebuilt {
            println!("{} {} {}", "✓".green(), program, version);
        }
        for (program, version, error) in &report.failed {
            println!("{} {} {}: {}", "✗".red(), program, version, error);
        }
        if !report.failed.is_empty() {
            bail!(
                "{} of {} manifests could not be rebuilt",
                report.failed.len(),
                report.rebuilt.len() + report.failed.len()
            );
        }
        Ok(())
    }
}
