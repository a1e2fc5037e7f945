use pdf_ws_core::JobController;
use std::path::PathBuf;

/// Build information reported by `/version`
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build: String,
    pub git_commit: String,
}

impl BuildInfo {
    pub fn from_env() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build: option_env!("PDFWS_BUILD").unwrap_or("dev").to_string(),
            git_commit: option_env!("PDFWS_GIT_COMMIT").unwrap_or("unknown").to_string(),
        }
    }
}

/// Global application state
pub struct AppState {
    pub controller: JobController,
    /// Storage root, checked by the health check
    pub storage_root: PathBuf,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(controller: JobController, storage_root: PathBuf) -> Self {
        Self {
            controller,
            storage_root,
            build: BuildInfo::from_env(),
        }
    }
}
