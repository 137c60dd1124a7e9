//! Route table

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::{files, health};
use crate::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(health::handle_health))
        .route("/api/stats", get(files::handle_stats))
        .route("/upload", post(files::upload_file))
        .route("/uploads/:key", get(files::serve_file))
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "upload": "POST /upload (multipart field \"file\")",
            "download": "GET /uploads/{key}",
            "stats": "GET /api/stats",
            "health": "GET /health"
        }
    }))
}
