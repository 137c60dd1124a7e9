use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::{
    error::{AppError, Result},
    files::{StoreOutcome, UploadRequest},
    AppState,
};

/// Multipart field that carries the upload.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub key: String,
}

fn upload_response(outcome: StoreOutcome) -> (StatusCode, Json<UploadResponse>) {
    let (status, message) = match &outcome {
        StoreOutcome::Stored(_) => (StatusCode::CREATED, "File uploaded successfully"),
        StoreOutcome::Duplicate(_) => (StatusCode::OK, "Duplicate file detected"),
    };

    (
        status,
        Json(UploadResponse {
            message,
            key: outcome.key().to_string(),
        }),
    )
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let file_manager = &state.file_manager;

    file_manager.sweep_expired().await;

    let max_size = file_manager.validator().max_file_size();
    let mut upload: Option<UploadRequest> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        // A part without a filename is a plain form value, not a file.
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let mut data = Vec::new();

        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_size))? {
            if (data.len() + chunk.len()) as u64 > max_size {
                file_manager.metrics().record_rejected();
                return Err(AppError::FileTooLarge { max_size });
            }
            data.extend_from_slice(&chunk);
        }

        upload = Some(UploadRequest::new(filename, data));
        break;
    }

    let Some(upload) = upload else {
        file_manager.metrics().record_rejected();
        return Err(AppError::NoFile);
    };

    info!(
        "POST /upload - {:?} ({} bytes)",
        upload.original_filename,
        upload.declared_size()
    );

    let outcome = file_manager
        .process_upload(&upload.original_filename, &upload.data)
        .await
        .into_outcome()?;

    Ok(upload_response(outcome))
}

/// The transport's body limit surfaces as a multipart error; report it the
/// same way as the per-file limit.
fn multipart_error(err: MultipartError, max_size: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge { max_size }
    } else {
        AppError::BadRequest(format!("Failed to read multipart body: {}", err.body_text()))
    }
}

pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    info!("GET /uploads/{}", key);

    let (object, data) = state
        .file_manager
        .get_file_data(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let mime = mime_guess::from_ext(object.key.extension()).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600")),
        ],
        data,
    )
        .into_response())
}

pub async fn handle_stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let file_manager = &state.file_manager;
    let storage = file_manager.get_storage_stats().await?;

    Ok(Json(serde_json::json!({
        "storage": storage,
        "uploads": file_manager.metrics().get_snapshot(),
        "limits": {
            "max_file_size_bytes": file_manager.validator().max_file_size(),
            "lifetime_hours": file_manager.sweeper().lifetime().as_secs() / 3600,
        }
    })))
}
