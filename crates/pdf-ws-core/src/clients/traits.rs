use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One source image, in catalog order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Numeric catalog id, used for page-subset selection
    pub id: i64,
    /// Image PID on the image server
    pub pid: String,
    pub filename: String,
    pub title: String,
}

/// What a catalog lookup is scoped to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub pid: String,
    /// Positive unit id restricting the manifest
    pub unit: Option<u64>,
    /// Page ids to keep; empty keeps every page
    pub pages: Vec<i64>,
}

impl PageQuery {
    pub fn new(pid: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_unit(mut self, unit: Option<u64>) -> Self {
        self.unit = unit;
        self
    }

    #[must_use]
    pub fn with_pages(mut self, pages: Vec<i64>) -> Self {
        self.pages = pages;
        self
    }
}

/// Parse a comma-separated page selection.
///
/// Empty and non-numeric entries are ignored.
pub fn parse_page_selection(pages: &str) -> Vec<i64> {
    pages
        .split(',')
        .filter_map(|p| p.trim().parse::<i64>().ok())
        .collect()
}

/// Descriptive metadata for the optional cover page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverPageInfo {
    /// Catalog record id, substituted into the public record URL
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: String,
    pub rights: String,
}

/// Resolves a PID into an ordered page list
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn pages(&self, query: &PageQuery) -> Result<Vec<PageDescriptor>>;
}

/// Looks up cover page metadata for a PID
#[async_trait]
pub trait CoverMetadataClient: Send + Sync {
    async fn cover_info(&self, pid: &str) -> Result<CoverPageInfo>;
}

/// Downloads a reduced-size page image
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the image for `pid` into `dir`, returning the written path.
    async fn fetch(&self, pid: &str, dir: &Path) -> Result<PathBuf>;
}

/// Arguments for one converter run
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub output: PathBuf,
    pub chunk_size: u32,
    /// Cover page flags, already in `-c -h ... -f ...` form
    pub cover_args: Vec<String>,
    pub images: Vec<PathBuf>,
}

impl ConversionRequest {
    /// Full argument list in converter order.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            self.output.to_string_lossy().into_owned(),
            "-n".to_string(),
            self.chunk_size.to_string(),
        ];
        args.extend(self.cover_args.iter().cloned());
        args.push("--".to_string());
        args.extend(
            self.images
                .iter()
                .map(|p| p.to_string_lossy().into_owned()),
        );
        args
    }
}

/// Outcome of a converter run
#[derive(Debug)]
pub struct ConversionOutput {
    /// Captured stdout followed by stderr
    pub log: Vec<u8>,
    /// `Ok` when the PDF exists, otherwise the error text to record
    pub result: Result<()>,
}

/// Merges page images into a single PDF
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> ConversionOutput;
}
