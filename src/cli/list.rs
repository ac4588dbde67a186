//! Server listings.

use super::{CliConfig, ServerArgs};
use crate::client::ServerClient;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Command to list programs and their latest versions.
#[derive(Args, Debug)]
pub struct ProgramsCommand {
    /// Output as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    server: ServerArgs,
}

impl ProgramsCommand {
    /// Prints the program listing.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let client = ServerClient::new(&self.server.client_config(config).await?)?;
        let programs = client.programs().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&programs)?);
        } else if programs.is_empty() {
            println!("No programs published");
        } else {
            for program in programs {
                println!("{} {}", program.name.bold(), program.latest_version);
            }
        }
        Ok(())
    }
}

/// Command to list the versions of one program.
#[derive(Args, Debug)]
pub struct VersionsCommand {
    /// Program name
    program: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    server: ServerArgs,
}

impl VersionsCommand {
    /// Prints versions with the first line of their changelog.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let client = ServerClient::new(&self.server.client_config(config).await?)?;
        let versions = client.versions(&self.program).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&versions)?);
            return Ok(());
        }
        for summary in versions.iter().rev() {
            let headline = summary.changelog_text.lines().next().unwrap_or_default();
            println!("{} {}", summary.version.to_string().bold(), headline.dimmed());
        }
        Ok(())
    }
}
