mod removal;
mod state;

pub use removal::remove_dir_with_backoff;
pub use state::{
    CONVERT_LOG_FILE, DONE_FILE, FAIL_FILE, JobStateStore, PROGRESS_FILE, SentinelStore,
    progress_percent, rewrite_legacy_path,
};

use crate::config::StorageConfig;
use std::sync::Arc;

/// Create the job state store from configuration
pub fn create_store(config: &StorageConfig) -> Arc<dyn JobStateStore> {
    Arc::new(SentinelStore::new(config.root(), config.legacy_prefix.clone()))
}
