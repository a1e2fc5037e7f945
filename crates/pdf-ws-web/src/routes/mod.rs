//! HTTP route handlers for the PDF generation service.
//!
//! Job routes answer in plain text (status words, `ok`, `DELETED`) or with
//! the polling page; downloads stream the finished file.

mod download;
mod jobs;
mod ops;

pub use download::download;
pub use jobs::{delete, generate, status};
pub use ops::{favicon, healthcheck, index, robots, version};

use axum::{
    Router,
    http::{HeaderValue, Request, header},
    routing::get,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info_span;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/robots.txt", get(robots))
        .route("/favicon.ico", get(favicon))
        .route("/version", get(version))
        .route("/healthcheck", get(healthcheck))
        .route("/pdf/{pid}", get(generate))
        .route("/pdf/{pid}/status", get(status))
        .route("/pdf/{pid}/download", get(download))
        .route("/pdf/{pid}/delete", get(delete))
        // Status answers change underneath the client; never cache them
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let id = uuid::Uuid::new_v4().simple().to_string();
                info_span!(
                    "request",
                    req = %&id[..8],
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
