//! Typed HTTP client for the program store server.
//!
//! Every call has the connect timeout from [`ClientConfig`]. Listings,
//! manifests and deletes are also bounded by the request timeout as a whole;
//! file, installer and publish transfers only by it as an idle timeout between
//! reads, so large files are never cut off while data keeps flowing. Publish
//! uploads only carry the connect timeout since the server answers after
//! the record is promoted.
//! Non-2xx responses are decoded from the server's error payload and mapped
//! back onto [`RolloutError`]: 401 becomes `Unauthorized`, 404 the matching
//! not-found variant, 400 `BadRequest`, and anything else (including transport
//! failures) `Network`.
//!
//! File downloads are retried with exponential backoff when the failure is a
//! network failure; a 404 or 400 is returned immediately.

use crate::config::{ClientConfig, Credentials};
use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::{ErrorKind, Result, RolloutError};
use crate::manifest::Manifest;
use crate::publish::ReleaseBundle;
use crate::registry::{ProgramSummary, VersionSummary};
use crate::server::{ErrorResponse, FileRequest, PublishResponse};
use crate::version::Version;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

const USER_AGENT: &str = concat!("rollout/", env!("CARGO_PKG_VERSION"));

/// Client for one server.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: reqwest::Client,
    uploads: reqwest::Client,
    base: Url,
    fetch_attempts: usize,
    request_timeout: Duration,
}

impl ServerClient {
    /// Builds a client from the config's URL, timeouts and retry count.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut raw = config.server_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|e| {
            RolloutError::bad_request(format!("invalid server URL '{}': {e}", config.server_url))
        })?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RolloutError::network("build HTTP client", e))?;
        let uploads = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RolloutError::network("build HTTP client", e))?;

        Ok(Self {
            http,
            uploads,
            base,
            fetch_attempts: config.fetch_retries.max(1),
            request_timeout: config.request_timeout(),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// `GET programs`
    pub async fn programs(&self) -> Result<Vec<ProgramSummary>> {
        let request = self.bounded(self.http.get(self.endpoint("programs")?));
        let response = self.send(request, "list programs").await?;
        let response = check(response, "list programs", || RolloutError::Other {
            message: "server has no program listing".to_string(),
        })
        .await?;
        decode_json(response, "list programs").await
    }

    /// `GET versions?program=`
    pub async fn versions(&self, program: &str) -> Result<Vec<VersionSummary>> {
        let request = self.http.get(self.endpoint("versions")?).query(&[("program", program)]);
        let response = self.send(self.bounded(request), "list versions").await?;
        let response = check(response, "list versions", || program_not_found(program)).await?;
        decode_json(response, "list versions").await
    }

    /// `GET actualVersion?program=`
    pub async fn latest_version(&self, program: &str) -> Result<Version> {
        let request = self.http.get(self.endpoint("actualVersion")?).query(&[("program", program)]);
        let response = self.send(self.bounded(request), "fetch latest version").await?;
        let response =
            check(response, "fetch latest version", || RolloutError::NoVersions {
                program: program.to_string(),
            })
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| RolloutError::network("read latest version", e))?;
        text.trim().trim_matches('"').parse()
    }

    /// `GET filesWithHash?program=&version=`
    pub async fn manifest(&self, program: &str, version: &Version) -> Result<Manifest> {
        let version_text = version.to_string();
        let request = self
            .http
            .get(self.endpoint("filesWithHash")?)
            .query(&[("program", program), ("version", version_text.as_str())]);
        let response = self.send(self.bounded(request), "fetch manifest").await?;
        let response = check(response, "fetch manifest", || {
            version_not_found(program, &version_text)
        })
        .await?;
        decode_json(response, "fetch manifest").await
    }

    /// `GET file`, streamed into `dest`.
    ///
    /// Retries network failures with exponential backoff; returns the number
    /// of bytes written.
    pub async fn download_file(
        &self,
        program: &str,
        version: &Version,
        relative_path: &str,
        dest: &Path,
    ) -> Result<u64> {
        let request = FileRequest {
            program: program.to_string(),
            version: version.to_string(),
            relative_path: relative_path.to_string(),
        };
        let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
            .take(self.fetch_attempts.saturating_sub(1));

        RetryIf::spawn(
            strategy,
            || self.download_file_once(&request, dest),
            |e: &RolloutError| {
                let retry = e.kind() == ErrorKind::NetworkFailure;
                if retry {
                    debug!("Retrying {}: {}", request.relative_path, e);
                }
                retry
            },
        )
        .await
    }

    async fn download_file_once(&self, request: &FileRequest, dest: &Path) -> Result<u64> {
        let builder = self.http.get(self.endpoint("file")?).json(request);
        let response = self.send(builder, "download file").await?;
        let response = check(response, "download file", || RolloutError::FileNotFound {
            program: request.program.clone(),
            version: request.version.clone(),
            path: request.relative_path.clone(),
        })
        .await?;
        write_body(response, dest).await
    }

    /// `GET installer`, saved under `dest_dir` with the server-provided name.
    pub async fn download_installer(
        &self,
        program: &str,
        version: &Version,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let version_text = version.to_string();
        let request = self
            .http
            .get(self.endpoint("installer")?)
            .query(&[("program", program), ("version", version_text.as_str())]);
        let response = self.send(request, "download installer").await?;
        let response = check(response, "download installer", || {
            version_not_found(program, &version_text)
        })
        .await?;

        let file_name = attachment_file_name(&response)
            .unwrap_or_else(|| format!("{program}-{version_text}-installer"));
        let file_name = crate::utils::path_validation::sanitize_file_name(&file_name)?;
        let dest = dest_dir.join(file_name);
        write_body(response, &dest).await?;
        Ok(dest)
    }

    /// `POST version` with a multipart release bundle.
    pub async fn publish(
        &self,
        credentials: &Credentials,
        bundle: &ReleaseBundle,
    ) -> Result<PublishResponse> {
        let mut form = Form::new()
            .text("login", credentials.login.clone())
            .text("password", credentials.password.clone())
            .text("program", bundle.program.clone())
            .text("version", bundle.version.clone())
            .part("sourceArchive", file_part(&bundle.source_archive, "source.zip").await?)
            .part(
                "installerFile",
                file_part(&bundle.installer.path, &bundle.installer.file_name).await?,
            );
        if let Some(changelog) = &bundle.changelog {
            form = form.part("changelogFile", file_part(changelog, "changelog.txt").await?);
        }

        let request = self.uploads.post(self.endpoint("version")?).multipart(form);
        let response = self.send(request, "publish").await?;
        let response = check(response, "publish", || {
            version_not_found(&bundle.program, &bundle.version)
        })
        .await?;
        decode_json(response, "publish").await
    }

    /// `DELETE version`
    pub async fn delete_version(
        &self,
        credentials: &Credentials,
        program: &str,
        version: &str,
    ) -> Result<()> {
        let form = [
            ("login", credentials.login.as_str()),
            ("password", credentials.password.as_str()),
            ("program", program),
            ("version", version),
        ];
        let request = self.http.delete(self.endpoint("version")?).form(&form);
        let response = self.send(self.bounded(request), "delete version").await?;
        check(response, "delete version", || version_not_found(program, version)).await?;
        Ok(())
    }

    /// `DELETE program`
    pub async fn delete_program(&self, credentials: &Credentials, program: &str) -> Result<()> {
        let form = [
            ("login", credentials.login.as_str()),
            ("password", credentials.password.as_str()),
            ("program", program),
        ];
        let request = self.http.delete(self.endpoint("program")?).form(&form);
        let response = self.send(self.bounded(request), "delete program").await?;
        check(response, "delete program", || program_not_found(program)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| RolloutError::bad_request(format!("invalid endpoint '{path}': {e}")))
    }

    /// Caps the whole exchange; only for endpoints with small bodies.
    fn bounded(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.timeout(self.request_timeout)
    }

    async fn send(&self, request: reqwest::RequestBuilder, operation: &str) -> Result<Response> {
        request.send().await.map_err(|e| RolloutError::network(operation, e))
    }
}

async fn check(
    response: Response,
    operation: &str,
    not_found: impl FnOnce() -> RolloutError,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|payload| payload.error.message)
        .unwrap_or(body);
    debug!("{} failed with HTTP {}: {}", operation, status, message);

    Err(match status {
        StatusCode::UNAUTHORIZED => RolloutError::Unauthorized,
        StatusCode::NOT_FOUND => not_found(),
        StatusCode::BAD_REQUEST => RolloutError::BadRequest { reason: message },
        _ => RolloutError::network(operation, format!("HTTP {status}: {message}")),
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
    operation: &str,
) -> Result<T> {
    response.json().await.map_err(|e| RolloutError::network(operation, e))
}

async fn write_body(response: Response, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RolloutError::io("create directory", parent, &e))?;
    }
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| RolloutError::io("create file", dest, &e))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| RolloutError::network("read response body", e))?;
        file.write_all(&chunk).await.map_err(|e| RolloutError::io("write file", dest, &e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| RolloutError::io("flush file", dest, &e))?;
    Ok(written)
}

async fn file_part(path: &Path, file_name: &str) -> Result<Part> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| RolloutError::io("open upload", path, &e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| RolloutError::io("read metadata", path, &e))?
        .len();
    Ok(Part::stream_with_length(file, length).file_name(file_name.to_string()))
}

fn attachment_file_name(response: &Response) -> Option<String> {
    let value = response.headers().get(reqwest::header::CONTENT_DISPOSITION)?.to_str().ok()?;
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

fn program_not_found(program: &str) -> RolloutError {
    RolloutError::ProgramNotFound {
        program: program.to_string(),
    }
}

fn version_not_found(program: &str, version: &str) -> RolloutError {
    RolloutError::VersionNotFound {
        program: program.to_string(),
        version: version.to_string(),
    }
}
