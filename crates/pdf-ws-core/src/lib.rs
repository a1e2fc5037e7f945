//! pdf-ws core library
//!
//! This library provides the job machinery behind the PDF generation gateway:
//! - Workspace resolution (a job is identified by the directory it runs in)
//! - Filesystem-backed job state (sentinel files, no database)
//! - Catalog, cover metadata, image server and converter collaborators
//! - The background assembly pipeline and the job controller

pub mod assembler;
pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod util;
pub mod workspace;

pub use assembler::{AssemblyJob, AssemblyOutcome, NO_IMAGES_MESSAGE, PdfAssembler};
pub use clients::{
    CatalogClient, ConversionOutput, ConversionRequest, Converter, CoverMetadataClient,
    CoverPageInfo, ImageFetcher, PageDescriptor, PageQuery,
};
pub use config::{AppConfig, RemovalPolicy};
pub use controller::{
    Collaborators, GenerateOutcome, JobController, JobParams, JobStatus, PdfDownload, Submission,
    job_status,
};
pub use error::{Error, Result};
pub use job::{JobStateStore, SentinelStore};
pub use workspace::WorkspacePath;

use tracing::debug;

/// Build a controller wired to the real collaborators named in `config`.
pub fn build_controller(config: &AppConfig) -> Result<JobController> {
    config.validate()?;

    let client = clients::http_client(config)?;
    let parts = Collaborators {
        store: job::create_store(&config.storage),
        catalog: clients::create_catalog(client.clone(), config),
        cover: clients::create_cover_client(client.clone(), config),
        images: clients::create_image_fetcher(client, config),
        converter: clients::create_converter(config),
    };

    debug!("Job controller ready");
    Ok(JobController::new(parts, config))
}
