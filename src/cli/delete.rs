//! Delete a version or a program.

use super::{CliConfig, CredentialArgs, ServerArgs};
use crate::client::ServerClient;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Command to delete published releases.
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Program name
    program: String,

    /// Version to delete; without it the whole program is deleted
    version: Option<String>,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    server: ServerArgs,
}

impl DeleteCommand {
    /// Sends the delete request.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let client = ServerClient::new(&self.server.client_config(config).await?)?;
        let credentials = self.credentials.credentials();

        match &self.version {
            Some(version) => {
                client
                    .delete_version(&credentials, &self.program, version)
                    .await
                    .with_context(|| format!("Failed to delete {} {}", self.program, version))?;
                println!("{} Deleted {} {}", "✓".green(), self.program, version);
            }
            None => {
                client
                    .delete_program(&credentials, &self.program)
                    .await
                    .with_context(|| format!("Failed to delete program {}", self.program))?;
                println!("{} Deleted program {}", "✓".green(), self.program);
            }
        }
        Ok(())
    }
}
