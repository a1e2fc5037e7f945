use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use super::traits::{CatalogClient, PageDescriptor, PageQuery};

/// PID type naming a single image
const MASTER_FILE: &str = "master_file";

/// Catalog record as returned by both the pid and manifest APIs.
///
/// The two share one loose shape; absent and null fields read as empty.
#[derive(Debug, Deserialize)]
struct PidInfo {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    pid: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

impl From<PidInfo> for PageDescriptor {
    fn from(info: PidInfo) -> Self {
        Self {
            id: info.id.unwrap_or_default(),
            pid: info.pid.unwrap_or_default(),
            filename: info.filename.unwrap_or_default(),
            title: info.title.unwrap_or_default(),
        }
    }
}

/// HTTP catalog client (`/api/pid/{pid}` and `/api/manifest/{pid}`)
pub struct TracksysCatalog {
    client: Client,
    api_host: String,
}

impl TracksysCatalog {
    pub fn new(client: Client, api_host: impl Into<String>) -> Self {
        Self {
            client,
            api_host: api_host.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, api: &str, pid: &str, unit: Option<u64>) -> String {
        let url = format!("{}/api/{}/{}", self.api_host, api, pid);
        match unit {
            Some(unit) => format!("{url}?unit={unit}"),
            None => url,
        }
    }

    async fn pid_info(&self, pid: &str) -> Result<PidInfo> {
        let url = self.url("pid", pid, None);
        debug!("Catalog pid request: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::CatalogRequest(format!("failed to receive pid response: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Error::CatalogNotFound(format!("PID {pid} not found"))),
            status if !status.is_success() => {
                return Err(Error::CatalogRequest(format!("pid request returned HTTP {status}")));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::CatalogRequest(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("Unable to parse pid response: {}", e);
            Error::CatalogInvalidResponse(format!("failed to unmarshal pid response: [{body}]"))
        })
    }

    async fn manifest(&self, query: &PageQuery) -> Result<Vec<PageDescriptor>> {
        let url = self.url("manifest", &query.pid, query.unit);
        debug!("Catalog manifest request: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::CatalogRequest(format!("failed to receive manifest response: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CatalogRequest(format!(
                "manifest request returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::CatalogRequest(e.to_string()))?;
        let all: Vec<PidInfo> = serde_json::from_str(&body).map_err(|e| {
            warn!("Unable to parse manifest response: {}", e);
            Error::CatalogInvalidResponse(format!("failed to unmarshal manifest response: [{body}]"))
        })?;

        let all: Vec<PageDescriptor> = all.into_iter().map(PageDescriptor::from).collect();
        Ok(filter_pages(all, &query.pages))
    }
}

/// Keep only the selected page ids, preserving manifest order.
fn filter_pages(pages: Vec<PageDescriptor>, selection: &[i64]) -> Vec<PageDescriptor> {
    if selection.is_empty() {
        return pages;
    }

    let wanted: HashSet<i64> = selection.iter().copied().collect();
    let total = pages.len();
    let kept: Vec<PageDescriptor> = pages.into_iter().filter(|p| wanted.contains(&p.id)).collect();
    info!("Filtered pages from {} to {}", total, kept.len());
    kept
}

#[async_trait]
impl CatalogClient for TracksysCatalog {
    async fn pages(&self, query: &PageQuery) -> Result<Vec<PageDescriptor>> {
        let info = self.pid_info(&query.pid).await?;
        let kind = info.kind.clone().unwrap_or_default();
        debug!("PID {} has type [{}]", query.pid, kind);

        let pages = if kind == MASTER_FILE {
            vec![PageDescriptor::from(info)]
        } else if kind.contains("metadata") || kind.contains("component") {
            self.manifest(query).await?
        } else {
            return Err(Error::CatalogUnhandledType(kind));
        };

        match pages.as_slice() {
            [] => info!("{} pid {} has no pages", kind, query.pid),
            [only] => info!("{} pid {} has 1 page: {}", kind, query.pid, only.pid),
            [first, .., last] => info!(
                "{} pid {} has {} pages: {} ... {}",
                kind,
                query.pid,
                pages.len(),
                first.pid,
                last.pid
            ),
        }

        Ok(pages)
    }
}
