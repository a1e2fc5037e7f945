mod traits;
mod catalog;
mod cover;
mod images;
mod converter;

pub use traits::{
    CatalogClient, ConversionOutput, ConversionRequest, Converter, CoverMetadataClient,
    CoverPageInfo, ImageFetcher, PageDescriptor, PageQuery, parse_page_selection,
};
pub use catalog::TracksysCatalog;
pub use cover::{DisabledCoverClient, SolrCoverClient, citation, clean_rights, cover_page_args};
pub use images::IiifImageFetcher;
pub use converter::ScriptConverter;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::Arc;

/// Build the HTTP client shared by every outbound collaborator
pub fn http_client(config: &AppConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("pdf-ws/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

/// Create the catalog client from configuration
pub fn create_catalog(client: Client, config: &AppConfig) -> Arc<dyn CatalogClient> {
    let host = config.catalog.api_host.clone().unwrap_or_default();
    Arc::new(TracksysCatalog::new(client, host))
}

/// Create the cover metadata client; without a search index every lookup is skipped
pub fn create_cover_client(client: Client, config: &AppConfig) -> Arc<dyn CoverMetadataClient> {
    match config.cover.solr_url_template.as_deref() {
        Some(template) if !template.trim().is_empty() => {
            Arc::new(SolrCoverClient::new(client, template))
        }
        _ => Arc::new(DisabledCoverClient),
    }
}

/// Create the image fetcher from configuration
pub fn create_image_fetcher(client: Client, config: &AppConfig) -> Arc<dyn ImageFetcher> {
    Arc::new(IiifImageFetcher::from_config(client, &config.images))
}

/// Create the converter from configuration
pub fn create_converter(config: &AppConfig) -> Arc<dyn Converter> {
    let script = config.converter.script.clone().unwrap_or_default();
    Arc::new(ScriptConverter::new(script))
}
