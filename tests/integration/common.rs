//! Shared helpers: a live server bound to an ephemeral port.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use rollout::client::ServerClient;
use rollout::server::{AppState, PublishResponse, serve_on};
use rollout::test_utils::{ReleaseFixture, TestEnvironment};
use rollout::updater::{InstalledState, Updater, UpdaterSettings};
use rollout::version::Version;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A server running on `127.0.0.1:<ephemeral>` until dropped.
pub struct TestServer {
    /// Base URL with a trailing slash.
    pub url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    /// Start a server over `env`'s program store.
    pub async fn start(env: &TestEnvironment) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("bind test server")?;
        let addr = listener.local_addr()?;
        let state = AppState::new(&env.server_config());
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve_on(listener, state, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            url: format!("http://{addr}/"),
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Client configured for this server and `env`'s data directory.
    pub fn client(&self, env: &TestEnvironment) -> Result<ServerClient> {
        Ok(ServerClient::new(&env.client_config(&self.url))?)
    }

    /// Publish `fixture` over HTTP with the environment credentials.
    pub async fn publish(
        &self,
        env: &TestEnvironment,
        fixture: &ReleaseFixture,
    ) -> Result<PublishResponse> {
        let bundle = fixture.write_to(&env.uploads_dir)?;
        let client = self.client(env)?;
        Ok(client.publish(&TestEnvironment::credentials(), &bundle).await?)
    }

    /// Stop the server and wait for it to drain.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Parse a version literal.
pub fn v(text: &str) -> Version {
    text.parse().expect("valid version literal")
}

/// Updater for `program` at `installed`, installed into `env.install_dir`.
pub fn updater(
    server: &TestServer,
    env: &TestEnvironment,
    program: &str,
    installed: &str,
    retention: usize,
) -> Result<Updater<ServerClient>> {
    Ok(Updater::new(
        server.client(env)?,
        InstalledState {
            program: program.to_string(),
            version: v(installed),
            install_path: env.install_dir.clone(),
        },
        UpdaterSettings {
            history_dir: env.history_dir(program),
            retention,
            max_parallel: 4,
        },
    ))
}
