//! Operational routes - banner, robots, version and health.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

pub async fn index(State(state): State<Arc<AppState>>) -> String {
    format!("PDF generation service version {}", state.build.version)
}

pub async fn robots() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "User-agent: *\nDisallow: /\n")
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn version(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "version": state.build.version,
        "build": state.build.build,
        "git_commit": state.build.git_commit,
    }))
}

/// Healthy when the storage root is a readable directory.
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (healthy, message) = match tokio::fs::metadata(&state.storage_root).await {
        Ok(meta) if meta.is_dir() => (true, String::new()),
        Ok(_) => (false, format!("{} is not a directory", state.storage_root.display())),
        Err(e) => (false, format!("{}: {}", state.storage_root.display(), e)),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        warn!("Health check failed: {}", message);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(json!({ "pdf_service": { "healthy": healthy, "message": message } })),
    )
}
