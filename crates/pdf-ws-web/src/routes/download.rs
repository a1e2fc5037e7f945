//! Download routes - streams a finished PDF.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use pdf_ws_core::JobParams;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::helpers::{CoreResultExt, ResultExt, RouteResult};
use crate::state::AppState;

/// Stream the finished PDF as an attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<JobParams>,
) -> RouteResult<Response> {
    let ws = params.workspace(&pid).or_status()?;
    let pdf = state.controller.download(&pid, &ws).await.or_status()?;

    info!("Sending {} ({} bytes)", pdf.path.display(), pdf.len);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, pdf.len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", pdf.filename),
        )
        .body(Body::from_stream(ReaderStream::new(pdf.file)))
        .or_internal_error()
}
