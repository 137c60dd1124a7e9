//! Health check handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use crate::AppState;

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let root = state.file_manager.store().root();

    let storage_ok = match tokio::fs::metadata(root).await {
        Ok(metadata) => metadata.is_dir(),
        Err(e) => {
            warn!("Storage directory {} unavailable: {}", root.display(), e);
            false
        }
    };

    let (status_code, status) = if storage_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "timestamp": chrono::Utc::now().timestamp(),
            "storage_available": storage_ok,
            "version": state.version,
        })),
    )
}
