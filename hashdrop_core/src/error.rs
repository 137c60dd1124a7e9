//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No file selected")]
    NoFile,

    #[error("Invalid file type")]
    InvalidFileType,

    #[error("File too large (max: {max_size} bytes)")]
    FileTooLarge { max_size: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyFile => AppError::NoFile,
            ValidationError::InvalidFileType { .. } => AppError::InvalidFileType,
            ValidationError::FileTooLarge { max_size, .. } => AppError::FileTooLarge { max_size },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NoFile => (StatusCode::BAD_REQUEST, "No file selected".to_string()),
            AppError::InvalidFileType => {
                (StatusCode::BAD_REQUEST, "Invalid file type".to_string())
            }
            AppError::FileTooLarge { max_size } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File too large (Max {})", human_size(max_size)),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Storage(err) => {
                tracing::error!("Storage error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Renders a byte limit the way clients see it, e.g. `5MB` or `512KB`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}
