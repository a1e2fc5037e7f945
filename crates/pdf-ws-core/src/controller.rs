use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::assembler::{AssemblyJob, PdfAssembler};
use crate::clients::{
    CatalogClient, Converter, CoverMetadataClient, ImageFetcher, PageQuery, cover_page_args,
    parse_page_selection,
};
use crate::config::{AppConfig, CleanupConfig, CoverConfig};
use crate::error::{Error, Result};
use crate::job::{JobStateStore, remove_dir_with_backoff};
use crate::workspace::{WorkspacePath, parse_unit};

/// Query parameters shared by every job endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobParams {
    pub unit: Option<String>,
    pub pages: Option<String>,
    pub token: Option<String>,
    pub embed: Option<String>,
}

impl JobParams {
    /// Whether the caller asked for the bare acknowledgement instead of the polling page.
    pub fn embed(&self) -> bool {
        !matches!(self.embed.as_deref(), None | Some("" | "0"))
    }

    fn pages(&self) -> Option<&str> {
        self.pages.as_deref().filter(|p| !p.is_empty())
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Resolve and validate the workspace these parameters address.
    pub fn workspace(&self, pid: &str) -> Result<WorkspacePath> {
        let ws = WorkspacePath::resolve(pid, self.unit.as_deref(), self.token());
        ws.ensure_contained()?;
        Ok(ws)
    }
}

/// Whether a generate request started new work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Started,
    AlreadySubmitted,
}

/// Result of a generate request
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub pid: String,
    pub workspace: WorkspacePath,
    pub embed: bool,
    pub submission: Submission,
}

/// Client-visible job status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Ready,
    Failed,
    /// Raw progress text, e.g. `"40%"`
    Progress(String),
    /// In progress but the progress marker could not be read
    Processing,
    NotFound,
}

impl JobStatus {
    /// Body text returned by the status endpoint
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Failed => "FAILED",
            Self::Progress(p) => p,
            Self::Processing => "PROCESSING",
            Self::NotFound => "Not found",
        }
    }
}

/// Derive the client-visible status of a workspace from its sentinels.
pub async fn job_status(store: &dyn JobStateStore, ws: &WorkspacePath) -> JobStatus {
    if !store.is_valid_state(ws).await {
        return JobStatus::NotFound;
    }

    if store.is_done(ws).await {
        JobStatus::Ready
    } else if store.is_failed(ws).await {
        JobStatus::Failed
    } else {
        store
            .read_progress(ws)
            .await
            .map_or(JobStatus::Processing, JobStatus::Progress)
    }
}

/// An opened, finished PDF ready to stream
#[derive(Debug)]
pub struct PdfDownload {
    pub file: tokio::fs::File,
    pub len: u64,
    pub path: PathBuf,
    /// Attachment filename, `{pid}.pdf`
    pub filename: String,
}

/// Collaborators a controller is assembled from
pub struct Collaborators {
    pub store: Arc<dyn JobStateStore>,
    pub catalog: Arc<dyn CatalogClient>,
    pub cover: Arc<dyn CoverMetadataClient>,
    pub images: Arc<dyn ImageFetcher>,
    pub converter: Arc<dyn Converter>,
}

/// Owns the generate/status/download/delete lifecycle
pub struct JobController {
    store: Arc<dyn JobStateStore>,
    catalog: Arc<dyn CatalogClient>,
    cover: Arc<dyn CoverMetadataClient>,
    assembler: Arc<PdfAssembler>,
    cover_config: CoverConfig,
    cleanup: CleanupConfig,
    tracker: TaskTracker,
}

impl JobController {
    pub fn new(parts: Collaborators, config: &AppConfig) -> Self {
        let assembler = PdfAssembler::new(
            Arc::clone(&parts.store),
            parts.images,
            parts.converter,
            config.converter.chunk_size,
        );

        Self {
            store: parts.store,
            catalog: parts.catalog,
            cover: parts.cover,
            assembler: Arc::new(assembler),
            cover_config: config.cover.clone(),
            cleanup: config.cleanup.clone(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStateStore> {
        &self.store
    }

    /// Submit a generation job, or recognize one already submitted.
    pub async fn generate(&self, pid: &str, params: &JobParams) -> Result<GenerateOutcome> {
        if params.pages().is_some() && params.token().is_none() {
            return Err(Error::MissingToken);
        }

        let ws = params.workspace(pid)?;
        let mut outcome = GenerateOutcome {
            pid: pid.to_string(),
            workspace: ws.clone(),
            embed: params.embed(),
            submission: Submission::AlreadySubmitted,
        };

        // Done wins over failed when both sentinels are present
        if !self.store.is_done(&ws).await && self.store.is_failed(&ws).await {
            info!("Previous job in {} failed; clearing it", ws);
            self.retire_failed(&ws).await;
        }

        if self.store.is_valid_state(&ws).await {
            info!("Job for {} already submitted", ws);
            return Ok(outcome);
        }

        let query = PageQuery::new(pid)
            .with_unit(params.unit.as_deref().and_then(parse_unit))
            .with_pages(params.pages().map(parse_page_selection).unwrap_or_default());
        let pages = self.catalog.pages(&query).await?;

        let cover_args = match self.cover.cover_info(pid).await {
            Ok(info) => cover_page_args(&info, &self.cover_config, chrono::Local::now().date_naive()),
            Err(Error::CoverDisabled) => Vec::new(),
            Err(e) => {
                warn!("Cover metadata lookup for {} failed: {}", pid, e);
                warn!("Generating PDF without a cover page in {}", ws);
                Vec::new()
            }
        };

        self.store.create(&ws).await?;

        let job = AssemblyJob {
            workspace: ws.clone(),
            pid: pid.to_string(),
            pages,
            cover_args,
        };
        let assembler = Arc::clone(&self.assembler);
        let span = info_span!("job", workspace = %ws, pid = %pid);
        self.tracker.spawn(
            async move {
                let outcome = assembler.run(job).await;
                debug!("Assembly finished: {:?}", outcome);
            }
            .instrument(span),
        );

        outcome.submission = Submission::Started;
        Ok(outcome)
    }

    /// Move a failed workspace aside and remove it in the background.
    async fn retire_failed(&self, ws: &WorkspacePath) {
        match self.store.retire(ws).await {
            Ok(Some(retired)) => {
                let policy = self.cleanup.failed_policy();
                self.tracker.spawn(
                    async move {
                        if let Err(e) = remove_dir_with_backoff(&retired, policy).await {
                            debug!("Leaving {} behind: {}", retired.display(), e);
                        }
                    }
                    .instrument(info_span!("reclaim", workspace = %ws)),
                );
            }
            Ok(None) => {}
            Err(e) => warn!("Unable to clear failed job in {}: {}", ws, e),
        }
    }

    pub async fn status(&self, ws: &WorkspacePath) -> JobStatus {
        job_status(self.store.as_ref(), ws).await
    }

    /// Open the finished PDF for a completed job.
    pub async fn download(&self, pid: &str, ws: &WorkspacePath) -> Result<PdfDownload> {
        if !self.store.is_valid_state(ws).await || !self.store.is_done(ws).await {
            return Err(Error::JobNotFound);
        }

        let Some(path) = self.store.read_output(ws).await else {
            return Err(Error::OutputUnavailable {
                path: self.store.workspace_dir(ws),
                reason: "done marker is unreadable".to_string(),
            });
        };

        let unavailable = |e: std::io::Error| Error::OutputUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        };
        let file = tokio::fs::File::open(&path).await.map_err(unavailable)?;
        let len = file.metadata().await.map_err(unavailable)?.len();

        Ok(PdfDownload {
            file,
            len,
            path,
            filename: format!("{pid}.pdf"),
        })
    }

    /// Schedule removal of a workspace and return immediately.
    pub fn delete(&self, ws: &WorkspacePath) {
        let store = Arc::clone(&self.store);
        let policy = self.cleanup.delete_policy();
        let ws = ws.clone();
        let span = info_span!("delete", workspace = %ws);
        self.tracker.spawn(
            async move {
                if let Err(e) = store.remove(&ws, policy).await {
                    debug!("Delete of {} abandoned: {}", ws, e);
                }
            }
            .instrument(span),
        );
    }

    /// Number of background jobs and removals still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every background task spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop tracking new work and wait up to `grace` for running tasks.
    ///
    /// Returns false if tasks were still running when the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!("Waiting for {} background task(s) to finish", pending);
        }
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
