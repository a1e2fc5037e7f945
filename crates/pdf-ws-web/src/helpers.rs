//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Result` values and core errors
//! into HTTP-appropriate error responses.

use axum::http::StatusCode;
use pdf_ws_core::Error;
use tracing::{error, warn};

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

/// Maps core errors onto the status codes clients expect.
pub trait CoreResultExt<T> {
    /// Classify a failure from a job operation.
    fn or_status(self) -> RouteResult<T>;
}

impl<T> CoreResultExt<T> for pdf_ws_core::Result<T> {
    fn or_status(self) -> RouteResult<T> {
        self.map_err(|e| to_status(&e))
    }
}

fn to_status(err: &Error) -> (StatusCode, String) {
    match err {
        Error::MissingToken | Error::InvalidIdentifier(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        e if e.is_not_found() => {
            warn!("Catalog lookup failed: {}", e);
            (
                StatusCode::NOT_FOUND,
                format!("ERROR: Could not retrieve PID info: [{e}]"),
            )
        }
        Error::CatalogRequest(_) | Error::CatalogInvalidResponse(_) => {
            error!("Catalog error: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                format!("ERROR: Could not retrieve PID info: [{err}]"),
            )
        }
        Error::JobNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        Error::OutputUnavailable { .. } => {
            error!("{}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        other => {
            error!("Request failed: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
