//! One-shot update check.

use super::{CliConfig, ServerArgs};
use crate::client::ServerClient;
use crate::updater::check_for_update;
use crate::utils::ProgressBar;
use crate::version::Version;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Command to check whether a newer version is published.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Program name on the server
    program: String,

    /// Installed version
    current_version: Version,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    server: ServerArgs,
}

impl CheckCommand {
    /// Prints whether an update is needed. Never fails on server errors.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let client = ServerClient::new(&self.server.client_config(config).await?)?;
        let spinner = if config.no_progress || self.json {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        spinner.set_message(format!("Checking {}", self.program));
        let check = check_for_update(&client, &self.program, &self.current_version).await;
        spinner.finish_and_clear();

        if self.json {
            let output = serde_json::json!({
                "program": self.program,
                "installed": self.current_version,
                "latest": check.latest,
                "needed": check.needed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        match check.latest {
            Some(latest) if check.needed => println!(
                "{} {} {} → {} available",
                "↑".cyan(),
                self.program,
                self.current_version,
                latest.to_string().bold()
            ),
            Some(latest) => println!(
                "{} {} {} is up to date (latest {})",
                "✓".green(),
                self.program,
                self.current_version,
                latest
            ),
            None => println!(
                "{} Could not determine the latest version of {}",
                "!".yellow(),
                self.program
            ),
        }
        Ok(())
    }
}
