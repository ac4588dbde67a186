//! Command-line interface for rollout.
//!
//! One binary carries both sides of the system:
//!
//! ## Server
//! - `serve` - Run the program store HTTP server
//! - `rebuild-manifests` - Recompute `FilesHash.json` for every stored version
//!
//! ## Client
//! - `update` - Keep an install up to date (check → sync → apply, repeatedly)
//! - `check` - One-shot update check
//! - `rollback` - Restore a retained version into the install path
//!
//! ## Publishing
//! - `publish` - Upload a release bundle
//! - `delete` - Delete a version or a whole program
//! - `programs` / `versions` - Inspect what the server has
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug output
//! - `--quiet` - Only errors
//! - `--no-progress` - Disable progress bars
//! - `--config` - TOML config for the server or client side
//!
//! # Example
//!
//! ```bash
//! # Server
//! ROLLOUT_LOGIN=admin ROLLOUT_PASSWORD=secret rollout serve --root ./programs
//!
//! # Publish
//! rollout publish Editor 1.0.0.1 --archive build.zip --installer setup.exe \
//!     --changelog notes.txt --login admin --password secret
//!
//! # Client: press Enter to re-check, `q` to quit
//! rollout update Editor 1.0.0.0 "C:\Program Files\Editor"
//! ```

mod check;
mod delete;
mod list;
mod progress;
mod publish;
mod rebuild;
mod rollback;
mod serve;
mod update;

pub use progress::CliProgress;

use crate::config::ClientConfig;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runtime configuration derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Hide progress bars.
    pub no_progress: bool,
    /// Config file for the selected command.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Installs the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over the flag-derived level.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Loads the client config from `--config`, if any.
    pub async fn client_config(&self) -> Result<ClientConfig> {
        ClientConfig::load(self.config_path.as_deref()).await
    }
}

/// Main CLI structure for rollout.
#[derive(Parser)]
#[command(
    name = "rollout",
    about = "Incremental release distribution - program store server and hash-driven updater",
    version,
    author,
    long_about = "rollout publishes versioned program releases with per-file content hashes and \
                  keeps client installs up to date by downloading only the files that changed."
)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to a TOML config file (server config for `serve`, client config otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the program store server
    Serve(serve::ServeCommand),

    /// Keep an installed program up to date
    Update(update::UpdateCommand),

    /// Check once whether an update is available
    Check(check::CheckCommand),

    /// Restore a retained version into the install path
    Rollback(rollback::RollbackCommand),

    /// Upload a release bundle
    Publish(publish::PublishCommand),

    /// Delete a version or a whole program
    Delete(delete::DeleteCommand),

    /// List programs on the server
    Programs(list::ProgramsCommand),

    /// List versions of a program on the server
    Versions(list::VersionsCommand),

    /// Recompute the manifest of every stored version
    RebuildManifests(rebuild::RebuildCommand),
}

impl Cli {
    /// Execute the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Derive the runtime configuration from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration (no logging setup).
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Rollback(cmd) => cmd.execute(&config).await,
            Commands::Publish(cmd) => cmd.execute(&config).await,
            Commands::Delete(cmd) => cmd.execute(&config).await,
            Commands::Programs(cmd) => cmd.execute(&config).await,
            Commands::Versions(cmd) => cmd.execute(&config).await,
            Commands::RebuildManifests(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Publisher credentials shared by `publish` and `delete`.
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    /// Publisher login
    #[arg(long, env = "ROLLOUT_LOGIN")]
    login: String,

    /// Publisher password
    #[arg(long, env = "ROLLOUT_PASSWORD", hide_env_values = true)]
    password: String,
}

impl CredentialArgs {
    fn credentials(&self) -> crate::config::Credentials {
        crate::config::Credentials::new(&self.login, &self.password)
    }
}

/// Server URL override shared by client commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Server base URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,
}

impl ServerArgs {
    async fn client_config(&self, config: &CliConfig) -> Result<ClientConfig> {
        let mut client_config = config.client_config().await?;
        if let Some(server) = &self.server {
            client_config.server_url.clone_from(server);
        }
        Ok(client_config)
    }
}
