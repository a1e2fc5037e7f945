use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::CoverConfig;
use crate::error::{Error, Result};
use crate::util::{fill_template, first_element_of};
use super::traits::{CoverMetadataClient, CoverPageInfo};

#[derive(Debug, Default, Deserialize)]
struct SolrDoc {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title_a: Vec<String>,
    #[serde(default)]
    author_facet_a: Vec<String>,
    #[serde(default)]
    published_daterange: Vec<String>,
    #[serde(default)]
    rights_wrapper_a: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SolrResponse {
    #[serde(default, rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize)]
struct SolrEnvelope {
    #[serde(default)]
    response: SolrResponse,
}

/// Search-index lookup for cover page metadata
pub struct SolrCoverClient {
    client: Client,
    url_template: String,
}

impl SolrCoverClient {
    pub fn new(client: Client, url_template: impl Into<String>) -> Self {
        Self {
            client,
            url_template: url_template.into(),
        }
    }
}

#[async_trait]
impl CoverMetadataClient for SolrCoverClient {
    async fn cover_info(&self, pid: &str) -> Result<CoverPageInfo> {
        let url = fill_template(&self.url_template, "{PID}", pid);
        debug!("Cover metadata request: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::CoverRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CoverRequest(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::CoverRequest(e.to_string()))?;
        let envelope: SolrEnvelope = serde_json::from_str(&body)
            .map_err(|e| Error::CoverInvalidResponse(e.to_string()))?;

        let SolrResponse { num_found, docs } = envelope.response;
        let Some(doc) = docs.into_iter().next().filter(|_| num_found > 0) else {
            return Err(Error::CoverNotFound(pid.to_string()));
        };

        let info = CoverPageInfo {
            title: first_element_of(&doc.title_a).to_string(),
            author: first_element_of(&doc.author_facet_a).to_string(),
            year: first_element_of(&doc.published_daterange).to_string(),
            rights: first_element_of(&doc.rights_wrapper_a).to_string(),
            id: doc.id,
        };
        info!(
            id = %info.id,
            title = %info.title,
            author = %info.author,
            year = %info.year,
            "Cover metadata found for {}",
            pid
        );
        Ok(info)
    }
}

/// Client used when no search index is configured
pub struct DisabledCoverClient;

#[async_trait]
impl CoverMetadataClient for DisabledCoverClient {
    async fn cover_info(&self, _pid: &str) -> Result<CoverPageInfo> {
        Err(Error::CoverDisabled)
    }
}

/// Tidy the rights statement for print.
///
/// Catalog back-links are dropped, links are upgraded to https, and the stray
/// period after terms-page links is removed.
pub fn clean_rights(rights: &str) -> String {
    let kept: String = rights
        .split('\n')
        .filter(|line| !line.contains("/catalog/"))
        .map(|line| format!("{line}\n"))
        .collect();

    kept.replace("http:", "https:")
        .replace(".html.", ".html")
        .trim_end_matches('\n')
        .to_string()
}

/// Bibliographic citation for the cover page.
pub fn citation(info: &CoverPageInfo, record_url: &str) -> String {
    let mut citation = String::new();
    if !info.author.is_empty() {
        citation.push_str(info.author.trim_end_matches('.'));
        citation.push_str(". ");
    }
    if !info.year.is_empty() {
        citation.push_str(&format!("({}). ", info.year));
    }
    citation.push_str(&format!(
        "\"{}\" [PDF document]. Available from {}",
        info.title, record_url
    ));
    citation
}

/// Converter flags that request a cover page.
pub fn cover_page_args(info: &CoverPageInfo, config: &CoverConfig, today: NaiveDate) -> Vec<String> {
    let record_url = config.catalog_url_template.replace("{ID}", &info.id);
    let generated = format!("Generation date: {}", today.format("%Y-%m-%d"));
    let rights = format!("{}\n\n{}", config.library_id_label, clean_rights(&info.rights));
    let footer = format!(
        "{generated}\n\n\n{}\n\n\n\n{rights}",
        citation(info, &record_url)
    );

    let mut args = vec!["-c".to_string(), "-h".to_string(), config.header.clone()];
    if let Some(logo) = &config.logo {
        args.push("-l".to_string());
        args.push(logo.to_string_lossy().into_owned());
    }
    args.extend([
        "-t".to_string(),
        info.title.clone(),
        "-a".to_string(),
        info.author.clone(),
        "-f".to_string(),
        footer,
    ]);
    args
}
