use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds to wait for background jobs when shutting down
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Where job workspaces live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root; every workspace path is resolved beneath it
    pub root: Option<PathBuf>,
    /// Relative prefix older deployments wrote into done.txt
    #[serde(default = "default_legacy_prefix")]
    pub legacy_prefix: String,
}

fn default_legacy_prefix() -> String {
    "tmp/".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            legacy_prefix: default_legacy_prefix(),
        }
    }
}

impl StorageConfig {
    /// The configured storage root, or `.` when unset (validation rejects that case).
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Catalog API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL, e.g. "https://catalog.example.org"
    pub api_host: Option<String>,
}

/// Cover page configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    /// Search index URL with a `{PID}` placeholder; unset disables cover pages
    pub solr_url_template: Option<String>,
    /// Public record URL with an `{ID}` placeholder, cited on the cover page
    #[serde(default)]
    pub catalog_url_template: String,
    /// Logo image handed to the converter
    pub logo: Option<PathBuf>,
    /// Header text; `\n` sequences are interpreted by the converter script
    #[serde(default = "default_cover_header")]
    pub header: String,
    /// Label placed above the rights block in the footer
    #[serde(default = "default_library_id_label")]
    pub library_id_label: String,
}

fn default_cover_header() -> String {
    "This resource was made available courtesy of the Library.\\n\\nNOTICE: This material may be protected by copyright law (Title 17, United States Code)".to_string()
}

fn default_library_id_label() -> String {
    "Library ID Information:".to_string()
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            solr_url_template: None,
            catalog_url_template: String::new(),
            logo: None,
            header: default_cover_header(),
            library_id_label: default_library_id_label(),
        }
    }
}

/// Image server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image URL with a `{PID}` placeholder
    pub url_template: Option<String>,
    #[serde(default = "default_image_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay; doubles after every failed attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

const fn default_image_max_attempts() -> u32 {
    5
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            url_template: None,
            max_attempts: default_image_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// External converter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Converter executable (the mkpdf helper script)
    pub script: Option<PathBuf>,
    /// Page-count-per-chunk hint passed as `-n`
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
}

const fn default_chunk_size() -> u32 {
    50
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            script: None,
            chunk_size: default_chunk_size(),
        }
    }
}

/// Linear backoff schedule for deleting a workspace directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl RemovalPolicy {
    pub const fn new(max_attempts: u32, step: Duration) -> Self {
        Self { max_attempts, step }
    }

    /// Wait before each attempt; attempt `i` (0-indexed) waits `i * step`.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|i| self.step * i).collect()
    }

    /// Total time spent waiting if every attempt fails.
    pub fn worst_case(&self) -> Duration {
        self.schedule().into_iter().sum()
    }
}

/// Cleanup policies for deleted and failed jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_delete_max_attempts")]
    pub delete_max_attempts: u32,
    #[serde(default = "default_delete_step_secs")]
    pub delete_step_secs: u64,
    #[serde(default = "default_failed_max_attempts")]
    pub failed_max_attempts: u32,
    #[serde(default = "default_failed_step_secs")]
    pub failed_step_secs: u64,
}

const fn default_delete_max_attempts() -> u32 {
    10
}

const fn default_delete_step_secs() -> u64 {
    15
}

const fn default_failed_max_attempts() -> u32 {
    5
}

const fn default_failed_step_secs() -> u64 {
    2
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            delete_max_attempts: default_delete_max_attempts(),
            delete_step_secs: default_delete_step_secs(),
            failed_max_attempts: default_failed_max_attempts(),
            failed_step_secs: default_failed_step_secs(),
        }
    }
}

impl CleanupConfig {
    pub const fn delete_policy(&self) -> RemovalPolicy {
        RemovalPolicy::new(
            self.delete_max_attempts,
            Duration::from_secs(self.delete_step_secs),
        )
    }

    pub const fn failed_policy(&self) -> RemovalPolicy {
        RemovalPolicy::new(
            self.failed_max_attempts,
            Duration::from_secs(self.failed_step_secs),
        )
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cover: CoverConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/pdf-ws/config.toml, ./pdf-ws.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-ws").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("pdf-ws.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./pdf-ws.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./pdf-ws.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Check that every required value is present and sane.
    ///
    /// Reports all missing fields at once rather than stopping at the first.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.storage.root.is_none() {
            missing.push("storage.root".to_string());
        }
        if blank(self.catalog.api_host.as_deref()) {
            missing.push("catalog.api_host".to_string());
        }
        if blank(self.images.url_template.as_deref()) {
            missing.push("images.url_template".to_string());
        }
        if self.converter.script.is_none() {
            missing.push("converter.script".to_string());
        }

        if !missing.is_empty() {
            return Err(Error::ConfigMissing(missing));
        }

        if self.images.max_attempts == 0 {
            return Err(Error::ConfigInvalid {
                field: "images.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.converter.chunk_size == 0 {
            return Err(Error::ConfigInvalid {
                field: "converter.chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        let root = self.storage.root();
        let script = self.converter.script.clone().unwrap_or_default();
        tracing::info!(
            host = %self.server.host,
            port = self.server.port,
            storage_root = %root.display(),
            legacy_prefix = %self.storage.legacy_prefix,
            "[CONFIG] server/storage"
        );
        tracing::info!(
            catalog_api = self.catalog.api_host.as_deref().unwrap_or(""),
            solr_url_template = self.cover.solr_url_template.as_deref().unwrap_or("(cover pages disabled)"),
            catalog_url_template = %self.cover.catalog_url_template,
            image_url_template = self.images.url_template.as_deref().unwrap_or(""),
            "[CONFIG] upstreams"
        );
        tracing::info!(
            script = %script.display(),
            chunk_size = self.converter.chunk_size,
            image_attempts = self.images.max_attempts,
            timeout_secs = self.http.timeout_secs,
            "[CONFIG] pipeline"
        );
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
