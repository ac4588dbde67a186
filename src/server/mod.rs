//! HTTP surface of the program store.
//!
//! | Method   | Path             | Purpose                                   |
//! |----------|------------------|-------------------------------------------|
//! | `GET`    | `/programs`      | programs with their latest version        |
//! | `GET`    | `/versions`      | versions of a program with changelogs     |
//! | `GET`    | `/actualVersion` | latest version string                     |
//! | `GET`    | `/filesWithHash` | manifest of a version                     |
//! | `GET`    | `/file`          | raw bytes of one file of a version        |
//! | `GET`    | `/installer`     | installer artifact of a version           |
//! | `POST`   | `/version`       | publish (multipart, authenticated)        |
//! | `DELETE` | `/version`       | delete one version (authenticated)        |
//! | `DELETE` | `/program`       | delete a program (authenticated)          |
//!
//! Failures are returned as `{"error": {"code": "...", "message": "..."}}`.

pub mod error;
pub mod routes;
pub mod state;
pub mod upload;

pub use error::{ErrorDetail, ErrorResponse};
pub use routes::{FileRequest, PublishResponse};
pub use state::AppState;

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Builds the router over `state`.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.max_upload_bytes).unwrap_or(usize::MAX);
    let request_timeout = state.request_timeout;

    Router::new()
        .route("/programs", get(routes::list_programs))
        .route("/versions", get(routes::list_versions))
        .route("/actualVersion", get(routes::actual_version))
        .route("/filesWithHash", get(routes::files_with_hash))
        .route("/file", get(routes::get_file))
        .route("/installer", get(routes::get_installer))
        .route("/program", delete(routes::delete_program))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        // Uploads are bounded by size, not by time.
        .route(
            "/version",
            post(routes::publish_version)
                .delete(routes::delete_version)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_limit)),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the server until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let addr = config.socket_addr()?;
    tokio::fs::create_dir_all(&config.root)
        .await
        .with_context(|| format!("Failed to create program store {}", config.root.display()))?;

    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    info!("Serving programs from {} on {}", config.root.display(), listener.local_addr()?);

    serve_on(listener, AppState::new(&config), shutdown_signal()).await
}

/// Serves `state` on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn not_found(uri: axum::http::Uri) -> (StatusCode, axum::Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        axum::Json(ErrorResponse {
            error: ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message: format!("no route for {}", uri.path()),
            },
        }),
    )
}

async fn handle_timeout_error(_err: tower::BoxError) -> (StatusCode, axum::Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        axum::Json(ErrorResponse {
            error: ErrorDetail {
                code: "TIMEOUT".to_string(),
                message: "Request timed out".to_string(),
            },
        }),
    )
}
