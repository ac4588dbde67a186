use super::{Credentials, load_toml};
use crate::constants::{DEFAULT_BIND, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SERVER_REQUEST_TIMEOUT};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for `rollout serve`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Root of the program store.
    pub root: PathBuf,
    /// Login required for publish and delete.
    pub login: String,
    /// Password required for publish and delete.
    pub password: String,
    /// Upper bound for a single read or delete-program request. Publish
    /// uploads are bounded by `max_upload_bytes` instead.
    pub request_timeout_secs: u64,
    /// Maximum accepted body size for `POST version`.
    pub max_upload_bytes: u64,
    /// Parallel hashing workers used when building manifests.
    pub hash_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            root: PathBuf::from("programs"),
            login: String::new(),
            password: String::new(),
            request_timeout_secs: DEFAULT_SERVER_REQUEST_TIMEOUT.as_secs(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            hash_concurrency: crate::constants::default_parallelism(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("root", &self.root)
            .field("credentials", &self.credentials())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("hash_concurrency", &self.hash_concurrency)
            .finish()
    }
}

impl ServerConfig {
    /// Loads the config from `path` (if given), then applies environment overrides.
    ///
    /// An explicitly given path must exist.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_toml(path).await?,
            None => Self::default(),
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `ROLLOUT_BIND`, `ROLLOUT_ROOT`, `ROLLOUT_LOGIN` and `ROLLOUT_PASSWORD`.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("ROLLOUT_BIND") {
            self.bind = bind;
        }
        if let Some(root) = lookup("ROLLOUT_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(login) = lookup("ROLLOUT_LOGIN") {
            self.login = login;
        }
        if let Some(password) = lookup("ROLLOUT_PASSWORD") {
            self.password = password;
        }
    }

    /// Checks that the server can start with this config.
    ///
    /// # Errors
    ///
    /// Fails when credentials are missing or the bind address does not parse.
    pub fn validate(&self) -> Result<()> {
        if !self.credentials().is_complete() {
            bail!(
                "Server login and password must be configured (set ROLLOUT_LOGIN and ROLLOUT_PASSWORD or use --config)"
            );
        }
        self.socket_addr()?;
        if self.hash_concurrency == 0 {
            bail!("hash_concurrency must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// The parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind.parse().with_context(|| format!("Invalid bind address '{}'", self.bind))
    }

    /// The publish/delete credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.login, &self.password)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
