//! Keep an installed program up to date.
//!
//! Runs one cycle at start, then one per line on standard input (`q` quits),
//! or on a timer when `--interval` / `poll_interval_secs` is set.

use super::{CliConfig, CliProgress, ServerArgs};
use crate::client::ServerClient;
use crate::constants::HISTORY_DIR;
use crate::updater::{
    CycleOutcome, InstalledState, IntervalTrigger, LineTrigger, Updater, UpdaterSettings,
};
use crate::utils::path_validation::validate_program_name;
use crate::version::Version;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

/// Command to run the update loop.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Program name on the server
    program: String,

    /// Version currently installed at the install path
    current_version: Version,

    /// Live install directory
    install_path: PathBuf,

    /// Re-check every N seconds instead of waiting for input
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long, conflicts_with = "interval")]
    once: bool,

    #[command(flatten)]
    server: ServerArgs,
}

impl UpdateCommand {
    /// Builds the updater and runs it until the trigger is exhausted.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        validate_program_name(&self.program)?;
        let client_config = self.server.client_config(config).await?;
        let client = ServerClient::new(&client_config)?;
        let history_dir = client_config.program_data_dir(&self.program)?.join(HISTORY_DIR);

        let mut updater = Updater::new(
            client,
            InstalledState {
                program: self.program.clone(),
                version: self.current_version,
                install_path: self.install_path.clone(),
            },
            UpdaterSettings {
                history_dir,
                retention: client_config.retention,
                max_parallel: client_config.max_parallel,
            },
        );
        let progress = CliProgress::new(config.no_progress);

        if self.once {
            let outcome = updater.run_cycle(&progress).await.with_context(|| {
                format!("Failed to update {} at {}", self.program, self.install_path.display())
            })?;
            print_outcome(&self.program, &self.current_version, &outcome);
            return Ok(());
        }

        let interval =
            self.interval.map(Duration::from_secs).or_else(|| client_config.poll_interval());
        match interval {
            Some(period) => {
                println!(
                    "Watching {} every {}s (Ctrl-C to stop)",
                    self.program.bold(),
                    period.as_secs()
                );
                updater.run(&mut IntervalTrigger::new(period), &progress).await;
            }
            None => {
                println!("Press Enter to check {} again, 'q' to quit", self.program.bold());
                updater.run(&mut LineTrigger::stdin(), &progress).await;
            }
        }
        Ok(())
    }
}

fn print_outcome(program: &str, installed: &Version, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Updated(applied) => println!(
            "{} Updated {} {} → {} ({} fetched, {} reused)",
            "✓".green(),
            program,
            applied.from,
            applied.to,
            applied.report.fetched.len(),
            applied.report.reused.len()
        ),
        CycleOutcome::UpToDate {
            latest,
        } => println!("{} {} {} is up to date (latest {})", "✓".green(), program, installed, latest),
        CycleOutcome::Undetermined => {
            println!("{} Could not reach the server to check {}", "!".yellow(), program);
        }
    }
}
