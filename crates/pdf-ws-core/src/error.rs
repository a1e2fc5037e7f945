use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for pdf-ws-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Request validation (missing token, unsafe identifiers)
/// - Catalog and cover-metadata lookups
/// - Page image downloads
/// - External converter invocation
/// - Job state access and workspace removal
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Request Errors
    // ==========================================================================
    /// A page subset was requested without a workspace token
    #[error("Missing token")]
    MissingToken,

    /// An identifier would resolve outside the storage root
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ==========================================================================
    // Catalog Errors
    // ==========================================================================
    /// The catalog has no record for the PID
    #[error("{0}")]
    CatalogNotFound(String),

    /// The catalog knows the PID but it is not something we can print
    #[error("unhandled PID type: [{0}]")]
    CatalogUnhandledType(String),

    /// Catalog request failed (network, timeout, unexpected status)
    #[error("catalog request failed: {0}")]
    CatalogRequest(String),

    /// Catalog answered with something we could not parse
    #[error("invalid catalog response: {0}")]
    CatalogInvalidResponse(String),

    // ==========================================================================
    // Cover Metadata Errors
    // ==========================================================================
    /// Cover metadata lookup is not configured
    #[error("cover metadata lookup is disabled")]
    CoverDisabled,

    /// Search index request failed
    #[error("cover metadata request failed: {0}")]
    CoverRequest(String),

    /// Search index response could not be parsed
    #[error("invalid cover metadata response: {0}")]
    CoverInvalidResponse(String),

    /// Search index returned no document for the PID
    #[error("no cover metadata record found for {0}")]
    CoverNotFound(String),

    // ==========================================================================
    // Image Errors
    // ==========================================================================
    /// Image server reported the page image as absent
    #[error("no image for {0} found on image server")]
    ImageNotFound(String),

    /// Image request failed (network, timeout, unexpected status)
    #[error("image request failed: {0}")]
    ImageRequest(String),

    /// Maximum retry attempts exceeded for an image download
    #[error("image download for {pid} failed after {attempts} attempts")]
    ImageMaxRetriesExceeded { pid: String, attempts: u32 },

    // ==========================================================================
    // Conversion Errors
    // ==========================================================================
    /// Converter could not be started
    #[error("unable to run converter {program}: {reason}")]
    ConverterSpawn { program: String, reason: String },

    /// Converter ran but did not produce a PDF
    #[error("{0}")]
    ConversionFailed(String),

    // ==========================================================================
    // Job Errors
    // ==========================================================================
    /// No job in a done/failed/in-progress state exists for the workspace
    #[error("Not found")]
    JobNotFound,

    /// The recorded output could not be opened or inspected
    #[error("unable to open PDF {}: {reason}", path.display())]
    OutputUnavailable { path: PathBuf, reason: String },

    /// Workspace removal gave up after all attempts
    #[error("delete failed for [{}]: max attempts ({attempts}) reached", path.display())]
    RemovalExhausted { path: PathBuf, attempts: u32 },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    /// Missing required configuration fields
    #[error("missing required config field(s): {}", .0.join(", "))]
    ConfigMissing(Vec<String>),

    /// The shared HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the catalog considers the PID absent (answered as 404 rather
    /// than as an upstream failure).
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::CatalogNotFound(_) | Self::CatalogUnhandledType(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
