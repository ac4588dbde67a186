//! Upload a release bundle.

use super::{CliConfig, CredentialArgs, ServerArgs};
use crate::client::ServerClient;
use crate::publish::{ReleaseBundle, UploadedFile};
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Command to publish a version.
#[derive(Args, Debug)]
pub struct PublishCommand {
    /// Program name
    program: String,

    /// Version to publish (major.minor.build.revision)
    version: String,

    /// ZIP archive with the program files
    #[arg(long)]
    archive: PathBuf,

    /// Installer artifact
    #[arg(long)]
    installer: PathBuf,

    /// Changelog text file
    #[arg(long)]
    changelog: Option<PathBuf>,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    server: ServerArgs,
}

impl PublishCommand {
    /// Uploads the bundle and reports the published record.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        for path in [Some(&self.archive), Some(&self.installer), self.changelog.as_ref()]
            .into_iter()
            .flatten()
        {
            if !path.is_file() {
                bail!("File not found: {}", path.display());
            }
        }
        let installer_name = self
            .installer
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("Installer path has no file name")?;

        let bundle = ReleaseBundle {
            program: self.program.clone(),
            version: self.version.clone(),
            source_archive: self.archive.clone(),
            installer: UploadedFile {
                file_name: installer_name,
                path: self.installer.clone(),
            },
            changelog: self.changelog.clone(),
        };

        let client = ServerClient::new(&self.server.client_config(config).await?)?;
        let published = client
            .publish(&self.credentials.credentials(), &bundle)
            .await
            .with_context(|| format!("Failed to publish {} {}", self.program, self.version))?;

        println!(
            "{} Published {} {} ({} files{})",
            "✓".green(),
            published.program,
            published.version,
            published.files,
            if published.replaced { ", replaced existing" } else { "" }
        );
        Ok(())
    }
}
