//! Integration tests for pdf-ws-core
//!
//! These tests drive the job controller end to end against a temporary
//! storage root:
//! - Submission, idempotence and failed-job resubmission
//! - Partial page failures and the zero-image path
//! - Status, download (including legacy done paths) and delete
//! - Progress ordering as observed by the collaborators

use async_trait::async_trait;
use pdf_ws_core::config::StorageConfig;
use pdf_ws_core::job::{CONVERT_LOG_FILE, DONE_FILE, FAIL_FILE, PROGRESS_FILE};
use pdf_ws_core::{
    AppConfig, CatalogClient, Collaborators, ConversionOutput, ConversionRequest, Converter,
    CoverMetadataClient, CoverPageInfo, Error, ImageFetcher, JobController, JobParams, JobStatus,
    NO_IMAGES_MESSAGE, PageDescriptor, PageQuery, Result, SentinelStore, Submission,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

// =============================================================================
// Test Doubles
// =============================================================================

enum CatalogMode {
    Pages(Vec<PageDescriptor>),
    NotFound,
    Upstream,
}

/// Catalog that answers from a fixed page list
struct MockCatalog {
    mode: CatalogMode,
    calls: AtomicUsize,
}

impl MockCatalog {
    fn with_pages(pids: &[&str]) -> Self {
        let pages = pids
            .iter()
            .enumerate()
            .map(|(i, pid)| PageDescriptor {
                id: i64::try_from(i).unwrap() + 1,
                pid: (*pid).to_string(),
                filename: format!("{pid}.tif"),
                title: String::new(),
            })
            .collect();
        Self {
            mode: CatalogMode::Pages(pages),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(mode: CatalogMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn pages(&self, query: &PageQuery) -> Result<Vec<PageDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            CatalogMode::Pages(pages) => Ok(pages.clone()),
            CatalogMode::NotFound => Err(Error::CatalogNotFound(format!("PID {} not found", query.pid))),
            CatalogMode::Upstream => Err(Error::CatalogRequest("connection refused".to_string())),
        }
    }
}

/// Cover lookup that never finds anything
struct NoCover;

#[async_trait]
impl CoverMetadataClient for NoCover {
    async fn cover_info(&self, pid: &str) -> Result<CoverPageInfo> {
        Err(Error::CoverNotFound(pid.to_string()))
    }
}

/// Cover lookup that always finds the same record
struct FixedCover(CoverPageInfo);

#[async_trait]
impl CoverMetadataClient for FixedCover {
    async fn cover_info(&self, _pid: &str) -> Result<CoverPageInfo> {
        Ok(self.0.clone())
    }
}

/// Image server double that writes tiny files and snapshots progress
#[derive(Default)]
struct MockImages {
    missing: HashSet<String>,
    /// Delete the workspace during the first fetch
    vanish: bool,
    fetched: Mutex<Vec<String>>,
    progress_seen: Mutex<Vec<String>>,
}

impl MockImages {
    fn missing(pids: &[&str]) -> Self {
        Self {
            missing: pids.iter().map(|p| (*p).to_string()).collect(),
            ..Self::default()
        }
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MockImages {
    async fn fetch(&self, pid: &str, dir: &Path) -> Result<PathBuf> {
        self.fetched.lock().unwrap().push(pid.to_string());
        if let Ok(progress) = std::fs::read_to_string(dir.join(PROGRESS_FILE)) {
            self.progress_seen.lock().unwrap().push(progress);
        }

        if self.vanish {
            std::fs::remove_dir_all(dir)?;
            return Err(Error::ImageRequest("workspace removed".to_string()));
        }
        if self.missing.contains(pid) {
            return Err(Error::ImageNotFound(pid.to_string()));
        }

        let path = dir.join(format!("{pid}.jpg"));
        std::fs::write(&path, pid)?;
        Ok(path)
    }
}

/// Converter double that concatenates its inputs into the output file
#[derive(Default)]
struct MockConverter {
    fail: AtomicBool,
    requests: Mutex<Vec<ConversionRequest>>,
    progress_seen: Mutex<Vec<String>>,
}

impl MockConverter {
    fn failing() -> Self {
        let converter = Self::default();
        converter.fail.store(true, Ordering::SeqCst);
        converter
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Converter for MockConverter {
    async fn convert(&self, request: &ConversionRequest) -> ConversionOutput {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(dir) = request.output.parent()
            && let Ok(progress) = std::fs::read_to_string(dir.join(PROGRESS_FILE))
        {
            self.progress_seen.lock().unwrap().push(progress);
        }

        if self.fail.load(Ordering::SeqCst) {
            return ConversionOutput {
                log: b"convert: no images defined\n".to_vec(),
                result: Err(Error::ConversionFailed("exit status: 1".to_string())),
            };
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        for image in &request.images {
            pdf.extend(std::fs::read(image).unwrap_or_default());
            pdf.push(b'\n');
        }
        std::fs::write(&request.output, pdf).unwrap();
        ConversionOutput {
            log: b"merged\n".to_vec(),
            result: Ok(()),
        }
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

struct Harness {
    tmp: TempDir,
    controller: JobController,
    catalog: Arc<MockCatalog>,
    images: Arc<MockImages>,
    converter: Arc<MockConverter>,
}

impl Harness {
    fn new(catalog: MockCatalog, images: MockImages, converter: MockConverter) -> Self {
        Self::with_cover(catalog, images, converter, Arc::new(NoCover))
    }

    fn with_cover(
        catalog: MockCatalog,
        images: MockImages,
        converter: MockConverter,
        cover: Arc<dyn CoverMetadataClient>,
    ) -> Self {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig {
            storage: StorageConfig {
                root: Some(tmp.path().to_path_buf()),
                ..StorageConfig::default()
            },
            ..AppConfig::default()
        };

        let catalog = Arc::new(catalog);
        let images = Arc::new(images);
        let converter = Arc::new(converter);
        let parts = Collaborators {
            store: Arc::new(SentinelStore::new(tmp.path(), "tmp/")),
            catalog: catalog.clone(),
            cover,
            images: images.clone(),
            converter: converter.clone(),
        };

        Self {
            controller: JobController::new(parts, &config),
            tmp,
            catalog,
            images,
            converter,
        }
    }

    fn pages(pids: &[&str]) -> Self {
        Self::new(MockCatalog::with_pages(pids), MockImages::default(), MockConverter::default())
    }

    fn dir(&self, ws: &str) -> PathBuf {
        self.tmp.path().join(ws)
    }

    fn read(&self, ws: &str, file: &str) -> String {
        std::fs::read_to_string(self.dir(ws).join(file)).unwrap()
    }
}

fn params() -> JobParams {
    JobParams::default()
}

fn with_token(token: &str) -> JobParams {
    JobParams {
        token: Some(token.to_string()),
        ..JobParams::default()
    }
}

// =============================================================================
// Generate Tests
// =============================================================================

#[tokio::test]
async fn test_generate_to_download_round_trip() {
    let h = Harness::pages(&["p1", "p2", "p3"]);

    let outcome = h.controller.generate("uva-lib:1", &params()).await.unwrap();
    assert_eq!(outcome.submission, Submission::Started);
    assert_eq!(outcome.workspace.as_str(), "uva-lib:1");
    assert!(!outcome.embed);

    h.controller.wait_idle().await;
    let ws = outcome.workspace;
    assert_eq!(h.controller.status(&ws).await, JobStatus::Ready);
    assert_eq!(h.read("uva-lib:1", PROGRESS_FILE), "100%");
    assert_eq!(h.read("uva-lib:1", CONVERT_LOG_FILE), "merged\n");

    let recorded = PathBuf::from(h.read("uva-lib:1", DONE_FILE));
    assert!(recorded.is_absolute());
    let on_disk = std::fs::read(&recorded).unwrap();

    let mut download = h.controller.download("uva-lib:1", &ws).await.unwrap();
    assert_eq!(download.filename, "uva-lib:1.pdf");
    assert_eq!(download.len, on_disk.len() as u64);
    let mut streamed = Vec::new();
    download.file.read_to_end(&mut streamed).await.unwrap();
    assert_eq!(streamed, on_disk);

    // Intermediate page images are cleaned up after conversion.
    for pid in ["p1", "p2", "p3"] {
        assert!(!h.dir("uva-lib:1").join(format!("{pid}.jpg")).exists());
    }
}

#[tokio::test]
async fn test_duplicate_submission_does_no_work() {
    let h = Harness::pages(&["p1", "p2"]);

    let first = h.controller.generate("uva-lib:2", &params()).await.unwrap();
    let second = h.controller.generate("uva-lib:2", &params()).await.unwrap();
    h.controller.wait_idle().await;
    let third = h.controller.generate("uva-lib:2", &params()).await.unwrap();

    assert_eq!(first.submission, Submission::Started);
    assert_eq!(second.submission, Submission::AlreadySubmitted);
    assert_eq!(third.submission, Submission::AlreadySubmitted);
    assert_eq!(first.workspace, second.workspace);
    assert_eq!(h.catalog.calls(), 1);
    assert_eq!(h.images.fetched().len(), 2);
    assert_eq!(h.converter.calls(), 1);
}

#[tokio::test]
async fn test_all_pages_missing_fails_without_conversion() {
    let h = Harness::new(
        MockCatalog::with_pages(&["p1", "p2"]),
        MockImages::missing(&["p1", "p2"]),
        MockConverter::default(),
    );

    let outcome = h.controller.generate("uva-lib:3", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::Failed);
    assert_eq!(h.read("uva-lib:3", FAIL_FILE), NO_IMAGES_MESSAGE);
    assert_eq!(h.read("uva-lib:3", PROGRESS_FILE), "100%");
    assert_eq!(h.converter.calls(), 0);
}

#[tokio::test]
async fn test_empty_page_list_fails() {
    let h = Harness::pages(&[]);

    let outcome = h.controller.generate("uva-lib:empty", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::Failed);
    assert_eq!(h.converter.calls(), 0);
}

#[tokio::test]
async fn test_partial_failures_keep_catalog_order() {
    let h = Harness::new(
        MockCatalog::with_pages(&["p1", "p2", "p3", "p4"]),
        MockImages::missing(&["p2", "p4"]),
        MockConverter::default(),
    );

    let outcome = h.controller.generate("uva-lib:4", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(h.images.fetched(), ["p1", "p2", "p3", "p4"]);
    let requests = h.converter.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let dir = h.dir("uva-lib:4");
    assert_eq!(requests[0].images, [dir.join("p1.jpg"), dir.join("p3.jpg")]);
    assert_eq!(requests[0].output, dir.join("uva-lib:4.pdf"));
    assert!(requests[0].cover_args.is_empty());
    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::Ready);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_finishes_at_100() {
    let h = Harness::pages(&["p1", "p2", "p3"]);

    let outcome = h.controller.generate("uva-lib:5", &params()).await.unwrap();
    h.controller.wait_idle().await;

    // Four steps: three pages and the conversion.
    assert_eq!(*h.images.progress_seen.lock().unwrap(), ["0%", "25%", "50%"]);
    assert_eq!(*h.converter.progress_seen.lock().unwrap(), ["75%"]);
    assert_eq!(
        h.controller.status(&outcome.workspace).await,
        JobStatus::Ready
    );
    assert_eq!(h.read("uva-lib:5", PROGRESS_FILE), "100%");
}

#[tokio::test]
async fn test_conversion_failure_is_recorded() {
    let h = Harness::new(
        MockCatalog::with_pages(&["p1"]),
        MockImages::default(),
        MockConverter::failing(),
    );

    let outcome = h.controller.generate("uva-lib:6", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::Failed);
    assert_eq!(h.read("uva-lib:6", FAIL_FILE), "exit status: 1");
    assert_eq!(h.read("uva-lib:6", CONVERT_LOG_FILE), "convert: no images defined\n");
    assert_eq!(h.read("uva-lib:6", PROGRESS_FILE), "100%");
    assert!(!h.dir("uva-lib:6").join(DONE_FILE).exists());
}

#[tokio::test]
async fn test_failed_job_is_resubmitted_fresh() {
    let h = Harness::new(
        MockCatalog::with_pages(&["p1"]),
        MockImages::default(),
        MockConverter::failing(),
    );

    h.controller.generate("uva-lib:7", &params()).await.unwrap();
    h.controller.wait_idle().await;
    assert!(h.dir("uva-lib:7").join(FAIL_FILE).exists());

    h.converter.fail.store(false, Ordering::SeqCst);
    let again = h.controller.generate("uva-lib:7", &params()).await.unwrap();
    assert_eq!(again.submission, Submission::Started);
    h.controller.wait_idle().await;

    assert_eq!(h.catalog.calls(), 2);
    assert_eq!(h.controller.status(&again.workspace).await, JobStatus::Ready);
    assert!(!h.dir("uva-lib:7").join(FAIL_FILE).exists());

    let reclaim = h.tmp.path().join(".reclaim");
    let leftovers = std::fs::read_dir(&reclaim).map(Iterator::count).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_done_wins_over_stray_fail_marker() {
    let h = Harness::pages(&["p1"]);

    let first = h.controller.generate("uva-lib:17", &params()).await.unwrap();
    h.controller.wait_idle().await;
    std::fs::write(h.dir("uva-lib:17").join(FAIL_FILE), "late failure").unwrap();
    assert_eq!(h.controller.status(&first.workspace).await, JobStatus::Ready);

    let again = h.controller.generate("uva-lib:17", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(again.submission, Submission::AlreadySubmitted);
    assert_eq!(h.catalog.calls(), 1);
    assert_eq!(h.converter.calls(), 1);
    assert!(h.dir("uva-lib:17").join(DONE_FILE).exists());
    assert!(h.controller.download("uva-lib:17", &again.workspace).await.is_ok());
}

#[tokio::test]
async fn test_cover_metadata_reaches_converter() {
    let info = CoverPageInfo {
        id: "u123".to_string(),
        title: "Letters home".to_string(),
        author: "Jefferson, Thomas.".to_string(),
        year: "1787".to_string(),
        rights: "http://rightsstatements.org/vocab/InC-EDU/1.0/".to_string(),
    };
    let h = Harness::with_cover(
        MockCatalog::with_pages(&["p1", "p2"]),
        MockImages::default(),
        MockConverter::default(),
        Arc::new(FixedCover(info)),
    );

    h.controller.generate("uva-lib:18", &params()).await.unwrap();
    h.controller.wait_idle().await;

    let requests = h.converter.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let cover = &requests[0].cover_args;
    assert_eq!(&cover[..2], ["-c", "-h"]);
    assert_eq!(&cover[3..7], ["-t", "Letters home", "-a", "Jefferson, Thomas."]);
    assert_eq!(cover[7], "-f");
    let footer = &cover[8];
    assert!(footer.starts_with("Generation date: "));
    assert!(footer.contains("Jefferson, Thomas. (1787). \"Letters home\" [PDF document]."));
    assert!(footer.ends_with("https://rightsstatements.org/vocab/InC-EDU/1.0/"));

    // Cover flags precede the separator and the page images.
    let args = requests[0].args();
    let separator = args.iter().position(|a| a == "--").unwrap();
    let footer_at = args.iter().position(|a| a == footer).unwrap();
    assert!(footer_at < separator);
    assert_eq!(args.len() - separator - 1, 2);
}

#[tokio::test]
async fn test_workspace_removed_mid_run_aborts_silently() {
    let h = Harness::new(
        MockCatalog::with_pages(&["p1", "p2", "p3"]),
        MockImages {
            vanish: true,
            ..MockImages::default()
        },
        MockConverter::default(),
    );

    let outcome = h.controller.generate("uva-lib:8", &params()).await.unwrap();
    h.controller.wait_idle().await;

    assert_eq!(h.images.fetched(), ["p1"]);
    assert_eq!(h.converter.calls(), 0);
    assert!(!h.dir("uva-lib:8").exists());
    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::NotFound);
}

#[tokio::test]
async fn test_pages_without_token_is_rejected() {
    let h = Harness::pages(&["p1"]);
    let params = JobParams {
        pages: Some("1,2".to_string()),
        ..JobParams::default()
    };

    let err = h.controller.generate("uva-lib:9", &params).await.unwrap_err();
    assert!(matches!(err, Error::MissingToken));
    assert_eq!(h.catalog.calls(), 0);
    assert!(!h.dir("uva-lib:9").exists());
}

#[tokio::test]
async fn test_token_names_the_workspace() {
    let h = Harness::pages(&["p1", "p2"]);
    let params = JobParams {
        pages: Some("2".to_string()),
        token: Some("a1b2c3".to_string()),
        unit: Some("12".to_string()),
        embed: Some("1".to_string()),
    };

    let outcome = h.controller.generate("uva-lib:10", &params).await.unwrap();
    h.controller.wait_idle().await;

    assert!(outcome.embed);
    assert_eq!(outcome.workspace.as_str(), "a1b2c3");
    assert!(h.dir("a1b2c3").join(DONE_FILE).exists());
    assert!(!h.dir("uva-lib:10").exists());
}

#[tokio::test]
async fn test_unsafe_token_is_rejected() {
    let h = Harness::pages(&["p1"]);

    let err = h.controller.generate("uva-lib:11", &with_token("../../etc")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));
    assert_eq!(h.catalog.calls(), 0);
}

#[tokio::test]
async fn test_catalog_not_found_creates_nothing() {
    let h = Harness::new(
        MockCatalog::failing(CatalogMode::NotFound),
        MockImages::default(),
        MockConverter::default(),
    );

    let err = h.controller.generate("uva-lib:12", &params()).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!h.dir("uva-lib:12").exists());
}

#[tokio::test]
async fn test_catalog_outage_is_not_a_not_found() {
    let h = Harness::new(
        MockCatalog::failing(CatalogMode::Upstream),
        MockImages::default(),
        MockConverter::default(),
    );

    let err = h.controller.generate("uva-lib:13", &params()).await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(!h.dir("uva-lib:13").exists());
}

// =============================================================================
// Status / Download / Delete Tests
// =============================================================================

#[tokio::test]
async fn test_indeterminate_workspace_is_reclaimed_then_reusable() {
    let h = Harness::pages(&["p1"]);
    std::fs::create_dir_all(h.dir("uva-lib:14")).unwrap();
    let ws = params().workspace("uva-lib:14").unwrap();

    assert_eq!(h.controller.status(&ws).await, JobStatus::NotFound);
    assert!(!h.dir("uva-lib:14").exists());

    let outcome = h.controller.generate("uva-lib:14", &params()).await.unwrap();
    assert_eq!(outcome.submission, Submission::Started);
}

#[tokio::test]
async fn test_unreadable_progress_reports_processing() {
    let h = Harness::pages(&["p1"]);
    let dir = h.dir("uva-lib:15");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(PROGRESS_FILE), "").unwrap();
    let ws = params().workspace("uva-lib:15").unwrap();

    assert_eq!(h.controller.status(&ws).await, JobStatus::Processing);
    assert_eq!(JobStatus::Processing.as_str(), "PROCESSING");
}

#[tokio::test]
async fn test_download_before_done_is_not_found() {
    let h = Harness::pages(&["p1"]);
    let dir = h.dir("uva-lib:16");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(PROGRESS_FILE), "50%").unwrap();
    let ws = params().workspace("uva-lib:16").unwrap();

    assert_eq!(h.controller.status(&ws).await, JobStatus::Progress("50%".to_string()));
    let err = h.controller.download("uva-lib:16", &ws).await.unwrap_err();
    assert!(matches!(err, Error::JobNotFound));
}

#[tokio::test]
async fn test_download_with_missing_file_is_internal_error() {
    let h = Harness::pages(&["p1"]);
    let dir = h.dir("uva-lib:17");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(DONE_FILE), dir.join("gone.pdf").to_string_lossy().as_bytes()).unwrap();
    let ws = params().workspace("uva-lib:17").unwrap();

    let err = h.controller.download("uva-lib:17", &ws).await.unwrap_err();
    assert!(matches!(err, Error::OutputUnavailable { .. }));
}

#[tokio::test]
async fn test_legacy_done_path_is_rewritten() {
    let h = Harness::pages(&["p1"]);
    let dir = h.dir("legacy");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("legacy.pdf"), b"%PDF-legacy").unwrap();
    std::fs::write(dir.join(DONE_FILE), "tmp/legacy/legacy.pdf").unwrap();
    let ws = params().workspace("legacy").unwrap();

    let download = h.controller.download("legacy", &ws).await.unwrap();
    assert_eq!(download.len, 11);
    assert_eq!(download.path, dir.join("legacy.pdf"));
}

#[tokio::test]
async fn test_delete_removes_workspace_in_background() {
    let h = Harness::pages(&["p1"]);
    let outcome = h.controller.generate("uva-lib:18", &params()).await.unwrap();
    h.controller.wait_idle().await;
    assert!(h.dir("uva-lib:18").exists());

    h.controller.delete(&outcome.workspace);
    h.controller.wait_idle().await;

    assert!(!h.dir("uva-lib:18").exists());
    assert_eq!(h.controller.status(&outcome.workspace).await, JobStatus::NotFound);
}

#[tokio::test]
async fn test_delete_of_unknown_workspace_is_harmless() {
    let h = Harness::pages(&["p1"]);
    let ws = params().workspace("never-made").unwrap();

    h.controller.delete(&ws);
    h.controller.wait_idle().await;
    assert_eq!(h.controller.pending(), 0);
}

#[tokio::test]
async fn test_shutdown_waits_for_running_jobs() {
    let h = Harness::pages(&["p1", "p2"]);
    h.controller.generate("uva-lib:19", &params()).await.unwrap();

    assert!(h.controller.shutdown(std::time::Duration::from_secs(5)).await);
    assert!(h.dir("uva-lib:19").join(DONE_FILE).exists());
}
