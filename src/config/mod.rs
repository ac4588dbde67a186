//! Configuration for the update server and the client updater.
//!
//! Both sides read an optional TOML file and then apply environment variable
//! overrides. Missing files are not an error when no path was given
//! explicitly; every field has a default except the server credentials.
//!
//! # Server (`rollout serve --config server.toml`)
//!
//! ```toml
//! bind = "0.0.0.0:5228"
//! root = "/srv/rollout/programs"
//! login = "publisher"
//! password = "change-me"
//! request_timeout_secs = 300
//! max_upload_bytes = 4294967295
//! ```
//!
//! Overrides: `ROLLOUT_BIND`, `ROLLOUT_ROOT`, `ROLLOUT_LOGIN`, `ROLLOUT_PASSWORD`.
//!
//! # Client (`rollout update --config client.toml …`)
//!
//! ```toml
//! server_url = "http://updates.example.com:5228/"
//! retention = 4
//! max_parallel = 8
//! poll_interval_secs = 3600
//! ```
//!
//! Overrides: `ROLLOUT_SERVER_URL`, `ROLLOUT_DATA_DIR`.

mod client;
mod server;

pub use client::ClientConfig;
pub use server::ServerConfig;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;

/// Login/password pair guarding mutating server operations.
///
/// Passed by value into each publish and delete call and compared there, so
/// tests and embedders can substitute credentials freely.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Login name.
    pub login: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Whether both halves are set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.login.is_empty() && !self.password.is_empty()
    }

    /// Compares a presented login/password against these credentials.
    ///
    /// Incomplete configured credentials never match.
    #[must_use]
    pub fn matches(&self, login: &str, password: &str) -> bool {
        self.is_complete()
            && constant_time_eq(self.login.as_bytes(), login.as_bytes())
                & constant_time_eq(self.password.as_bytes(), password.as_bytes())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reads and parses a TOML config file.
async fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_match() {
        let creds = Credentials::new("admin", "secret");
        assert!(creds.matches("admin", "secret"));
        assert!(!creds.matches("admin", "wrong"));
        assert!(!creds.matches("Admin", "secret"));
        assert!(!creds.matches("", ""));
    }

    #[test]
    fn test_incomplete_credentials_never_match() {
        let creds = Credentials::new("", "");
        assert!(!creds.is_complete());
        assert!(!creds.matches("", ""));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
