//! Request handlers.
//!
//! Read endpoints take their identifiers from the query string. `GET file`
//! takes a JSON body `{program, version, relativePath}` and falls back to the
//! query string when the body is empty, so plain HTTP tools can fetch files
//! too. Mutating endpoints carry `login`/`password` in the request body.

use super::state::AppState;
use super::upload::spool_publish_request;
use crate::config::Credentials;
use crate::core::{Result, RolloutError};
use crate::manifest::Manifest;
use crate::registry::{ProgramSummary, VersionSummary};
use crate::utils::path_validation::parse_version_param;
use crate::version::Version;
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Form, Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// `?program=` parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProgramQuery {
    /// Program name.
    pub program: String,
}

/// `?program=&version=` parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VersionQuery {
    /// Program name.
    pub program: String,
    /// Version string.
    pub version: String,
}

/// Identifies one file of a published version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileRequest {
    /// Program name.
    pub program: String,
    /// Version string.
    pub version: String,
    /// Manifest path, e.g. `/bin/app.dll`.
    pub relative_path: String,
}

/// Body of `DELETE version` and `DELETE program`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteForm {
    /// Publisher login.
    pub login: String,
    /// Publisher password.
    pub password: String,
    /// Program name.
    pub program: String,
    /// Version string; ignored by `DELETE program`.
    pub version: String,
}

/// Successful `POST version` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    /// Program name.
    pub program: String,
    /// Published version.
    pub version: Version,
    /// Number of manifest entries.
    pub files: usize,
    /// Whether an existing record was superseded.
    pub replaced: bool,
}

/// `GET programs`
pub async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<ProgramSummary>>> {
    Ok(Json(state.registry.list_programs().await?))
}

/// `GET versions?program=`
pub async fn list_versions(
    State(state): State<AppState>,
    Query(query): Query<ProgramQuery>,
) -> Result<Json<Vec<VersionSummary>>> {
    Ok(Json(state.registry.version_summaries(&query.program).await?))
}

/// `GET actualVersion?program=`
pub async fn actual_version(
    State(state): State<AppState>,
    Query(query): Query<ProgramQuery>,
) -> Result<String> {
    let latest = state.registry.latest_version(&query.program).await?;
    Ok(latest.to_string())
}

/// `GET filesWithHash?program=&version=`
pub async fn files_with_hash(
    State(state): State<AppState>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Manifest>> {
    let version = parse_version_param(&query.version)?;
    Ok(Json(state.registry.get_manifest(&query.program, &version).await?))
}

/// `GET file`
pub async fn get_file(
    State(state): State<AppState>,
    Query(query): Query<FileRequest>,
    body: Bytes,
) -> Result<Response> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        query
    } else {
        serde_json::from_slice::<FileRequest>(&body)
            .map_err(|e| RolloutError::bad_request(format!("invalid file request body: {e}")))?
    };

    let version = parse_version_param(&request.version)?;
    let path = state.registry.file_path(&request.program, &version, &request.relative_path).await?;
    stream_file(&path, None).await
}

/// `GET installer?program=&version=`
pub async fn get_installer(
    State(state): State<AppState>,
    Query(query): Query<VersionQuery>,
) -> Result<Response> {
    let version = parse_version_param(&query.version)?;
    let path = state.registry.installer_path(&query.program, &version).await?;
    let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned());
    stream_file(&path, file_name.as_deref()).await
}

/// `POST version`
pub async fn publish_version(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PublishResponse>> {
    let upload = spool_publish_request(multipart, &state.credentials).await?;

    // Detached so a dropped connection cannot interrupt staging or promotion.
    let publisher = Arc::clone(&state.publisher);
    let credentials = Arc::clone(&state.credentials);
    let task = tokio::spawn(async move {
        publisher.publish(&credentials, &upload.presented, upload.bundle.clone()).await
    });
    let outcome = task.await.map_err(|e| RolloutError::Other {
        message: format!("publish task failed: {e}"),
    })??;
    Ok(Json(PublishResponse {
        program: outcome.program,
        version: outcome.version,
        files: outcome.files,
        replaced: outcome.replaced,
    }))
}

/// `DELETE version`
pub async fn delete_version(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<impl IntoResponse> {
    let presented = Credentials::new(form.login, form.password);
    state
        .publisher
        .delete_version(&state.credentials, &presented, &form.program, &form.version)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// `DELETE program`
pub async fn delete_program(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<impl IntoResponse> {
    let presented = Credentials::new(form.login, form.password);
    state.publisher.delete_program(&state.credentials, &presented, &form.program).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn stream_file(path: &Path, download_name: Option<&str>) -> Result<Response> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| RolloutError::io("open file", path, &e))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| RolloutError::io("read metadata", path, &e))?
        .len();

    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buffer.truncate(read);
        Ok(Some((Bytes::from(buffer), file)))
    });

    let mut response = Body::from_stream(chunks).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(length));
    if let Some(name) = download_name {
        let disposition = format!("attachment; filename=\"{}\"", name.replace(['"', '\\'], "_"));
        if let Ok(value) = header::HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
