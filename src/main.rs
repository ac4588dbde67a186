//! rollout CLI entry point
//!
//! Parses arguments, runs the selected command and renders failures as
//! user-friendly errors:
//! - `serve` - Run the program store server
//! - `update` - Keep an install up to date
//! - `check` - One-shot update check
//! - `rollback` - Restore a retained version
//! - `publish` / `delete` - Manage releases on the server
//! - `programs` / `versions` - Inspect the server
//! - `rebuild-manifests` - Recompute stored manifests

use anyhow::Result;
use clap::Parser;
use rollout::cli;
use rollout::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
