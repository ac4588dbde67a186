//! Shared handler state.

use crate::config::{Credentials, ServerConfig};
use crate::publish::Publisher;
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// State cloned into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read side of the store.
    pub registry: Registry,
    /// Write side of the store.
    pub publisher: Arc<Publisher>,
    /// Configured publish/delete credentials, handed to each mutating call.
    pub credentials: Arc<Credentials>,
    /// Upper bound for a whole request.
    pub request_timeout: Duration,
    /// Maximum body size for `POST version`.
    pub max_upload_bytes: u64,
}

impl AppState {
    /// Build the state from a server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Registry::new(&config.root);
        let publisher = Publisher::new(registry.clone(), config.hash_concurrency);
        Self {
            registry,
            publisher: Arc::new(publisher),
            credentials: Arc::new(config.credentials()),
            request_timeout: config.request_timeout(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
