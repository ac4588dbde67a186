//! Error → HTTP response mapping.

use crate::core::{ErrorKind, RolloutError};
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Error payload detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Taxonomy code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

/// Body of every non-2xx response: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error.
    pub error: ErrorDetail,
}

/// HTTP status for an error category.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::IoFailure | ErrorKind::PartialSync => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::NetworkFailure => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for RolloutError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(code = %kind, "{}", self);
        } else {
            tracing::debug!(code = %kind, "{}", self);
        }

        let payload = ErrorResponse {
            error: ErrorDetail {
                code: kind.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(payload)).into_response()
    }
}

impl From<MultipartError> for RolloutError {
    fn from(error: MultipartError) -> Self {
        Self::bad_request(format!("malformed multipart body: {error}"))
    }
}
