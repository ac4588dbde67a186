//! Run the program store server.

use super::CliConfig;
use crate::config::ServerConfig;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Command to run the HTTP server.
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind, e.g. `0.0.0.0:5228`
    #[arg(long)]
    bind: Option<String>,

    /// Program store root directory
    #[arg(long)]
    root: Option<PathBuf>,
}

impl ServeCommand {
    /// Loads the server config, applies flag overrides and serves until Ctrl-C.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let server_config = self.server_config(config).await?;
        crate::server::serve(server_config).await
    }

    async fn server_config(&self, config: &CliConfig) -> Result<ServerConfig> {
        let mut server_config = ServerConfig::load(config.config_path.as_deref()).await?;
        if let Some(bind) = &self.bind {
            server_config.bind.clone_from(bind);
        }
        if let Some(root) = &self.root {
            server_config.root.clone_from(root);
        }
        server_config.validate()?;
        Ok(server_config)
    }
}
