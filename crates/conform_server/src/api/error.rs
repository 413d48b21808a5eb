//! Mapping from conform failures to HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conform_core::orchestrator::{ErrorKind, PipelineError};
use serde_json::json;

/// Error returned by API handlers.
///
/// The body is always `{"error": <kind>, "detail": <message>}`.
#[derive(Debug)]
pub enum ApiError {
    /// A conform job failed.
    Pipeline(PipelineError),
    /// The request body could not be decoded.
    Malformed { status: StatusCode, message: String },
    /// No artifact under the requested name.
    NotFound,
    /// Server-side fault outside the pipeline (task join, store I/O).
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

/// HTTP status for each failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Download => StatusCode::BAD_REQUEST,
        ErrorKind::OutOfBounds => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Analysis => StatusCode::FAILED_DEPENDENCY,
        ErrorKind::Engine => StatusCode::BAD_GATEWAY,
        ErrorKind::Integrity | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Pipeline(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    tracing::error!(kind = %kind, "{}", err);
                } else {
                    tracing::info!(kind = %kind, "{}", err);
                }
                (status, kind.as_str(), err.client_message())
            }
            ApiError::Malformed { status, message } => (status, "malformed", message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", "Not found".to_string()),
            ApiError::Internal(message) => {
                tracing::error!("{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    message,
                )
            }
        };

        let body = Json(json!({
            "error": kind,
            "detail": message,
        }));

        (status, body).into_response()
    }
}
