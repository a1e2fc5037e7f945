//! Background PDF assembly for a single job.
//!
//! Pages are fetched strictly in catalog order and progress is recorded after
//! every step (one per page plus the final conversion). Terminal state is
//! recorded through the job state store; nothing is returned to a client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::{ConversionRequest, Converter, ImageFetcher, PageDescriptor};
use crate::job::JobStateStore;
use crate::workspace::WorkspacePath;

/// Failure message recorded when no page image could be fetched
pub const NO_IMAGES_MESSAGE: &str = "No jpg files to process";

/// Everything one assembly run needs
#[derive(Debug, Clone)]
pub struct AssemblyJob {
    pub workspace: WorkspacePath,
    pub pid: String,
    pub pages: Vec<PageDescriptor>,
    /// Cover page converter flags; empty when there is no cover
    pub cover_args: Vec<String>,
}

/// How an assembly run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    Done(PathBuf),
    Failed(String),
    /// The workspace disappeared mid-run (deleted underneath us)
    Aborted,
}

/// Drives page downloads and the converter for one job
pub struct PdfAssembler {
    store: Arc<dyn JobStateStore>,
    images: Arc<dyn ImageFetcher>,
    converter: Arc<dyn Converter>,
    chunk_size: u32,
}

impl PdfAssembler {
    pub fn new(
        store: Arc<dyn JobStateStore>,
        images: Arc<dyn ImageFetcher>,
        converter: Arc<dyn Converter>,
        chunk_size: u32,
    ) -> Self {
        Self {
            store,
            images,
            converter,
            chunk_size,
        }
    }

    pub async fn run(&self, job: AssemblyJob) -> AssemblyOutcome {
        let started = Instant::now();
        let ws = &job.workspace;
        let dir = self.store.workspace_dir(ws);
        let steps = job.pages.len() + 1;
        let mut images = Vec::with_capacity(job.pages.len());

        for (i, page) in job.pages.iter().enumerate() {
            if !self.store.exists(ws).await {
                warn!("Workspace {} no longer exists; abandoning job", dir.display());
                return AssemblyOutcome::Aborted;
            }

            debug!("Get reduced size jpg for {} {}", page.pid, page.filename);
            match self.images.fetch(&page.pid, &dir).await {
                Ok(path) => images.push(path),
                Err(e) => warn!("Unable to find source image for {}; skipping: {}", page.pid, e),
            }

            self.store.record_progress(ws, i + 1, steps).await;
        }

        if images.is_empty() {
            warn!("{} for {}", NO_IMAGES_MESSAGE, job.pid);
            self.store.record_failed(ws, NO_IMAGES_MESSAGE).await;
            self.store.record_progress(ws, steps, steps).await;
            return AssemblyOutcome::Failed(NO_IMAGES_MESSAGE.to_string());
        }

        let output = dir.join(format!("{}.pdf", job.pid));
        info!("Merging {} page images into {}", images.len(), output.display());

        let request = ConversionRequest {
            output: output.clone(),
            chunk_size: self.chunk_size,
            cover_args: job.cover_args,
            images,
        };
        let conversion = self.converter.convert(&request).await;
        self.store.record_converter_output(ws, &conversion.log).await;

        let outcome = match conversion.result {
            Ok(()) => {
                self.store.record_done(ws, &output).await;
                AssemblyOutcome::Done(output)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Unable to generate merged PDF: {}", message);
                self.store.record_failed(ws, &message).await;
                AssemblyOutcome::Failed(message)
            }
        };
        self.store.record_progress(ws, steps, steps).await;

        let elapsed = started.elapsed().as_secs_f64();
        let count = request.images.len();
        #[allow(clippy::cast_precision_loss)]
        let per_page = elapsed / count as f64;
        info!(
            "{} pages processed in {:.2} seconds ({:.2} seconds/page)",
            count, elapsed, per_page
        );

        for image in &request.images {
            if let Err(e) = tokio::fs::remove_file(image).await {
                debug!("Unable to remove {}: {}", image.display(), e);
            }
        }

        outcome
    }
}
