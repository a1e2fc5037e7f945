//! Job routes - generate, status and delete.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pdf_ws_core::{JobParams, JobStatus, Submission};
use std::sync::Arc;
use tracing::info;

use crate::helpers::{CoreResultExt, RouteResult};
use crate::state::AppState;
use crate::templates::PollingTemplate;

/// Start generating a PDF, or acknowledge one already under way.
///
/// Embedded callers get a bare `ok`; browsers get the polling page.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<JobParams>,
) -> RouteResult<Response> {
    let outcome = state.controller.generate(&pid, &params).await.or_status()?;

    if outcome.submission == Submission::Started {
        info!("Started PDF generation for {} in {}", pid, outcome.workspace);
    }

    if outcome.embed {
        Ok("ok".into_response())
    } else {
        Ok(PollingTemplate::new(&pid, outcome.workspace.as_str()).into_response())
    }
}

/// Report job status as plain text.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<JobParams>,
) -> RouteResult<String> {
    let ws = params.workspace(&pid).or_status()?;

    match state.controller.status(&ws).await {
        JobStatus::NotFound => Err((StatusCode::NOT_FOUND, JobStatus::NotFound.as_str().to_string())),
        status => Ok(status.as_str().to_string()),
    }
}

/// Schedule workspace removal; always acknowledged.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<JobParams>,
) -> RouteResult<&'static str> {
    let ws = params.workspace(&pid).or_status()?;
    info!("Delete requested for {}", ws);
    state.controller.delete(&ws);
    Ok("DELETED")
}
