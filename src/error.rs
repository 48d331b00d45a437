use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::detector::DetectError;

/// Request-level errors. User-input problems surface as plain-text 400s with
/// the same wording the upload form users have always seen; everything
/// downstream of a well-formed upload is a server-side failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("No file selected")]
    EmptyFilename,
    #[error("malformed multipart request: {0}")]
    Multipart(String),
    #[error("detection model timed out")]
    ModelTimeout,
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingFile | AppError::EmptyFilename | AppError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ModelTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Detect(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, "request failed: {message}");
        } else {
            tracing::debug!(%status, "rejected request: {message}");
        }
        (status, message).into_response()
    }
}
