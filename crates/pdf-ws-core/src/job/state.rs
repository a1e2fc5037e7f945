use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::RemovalPolicy;
use crate::error::Result;
use crate::workspace::{RECLAIM_DIR, WorkspacePath};

use super::removal::remove_dir_with_backoff;

/// Holds the absolute path of the finished PDF
pub const DONE_FILE: &str = "done.txt";
/// Holds the failure diagnostic
pub const FAIL_FILE: &str = "fail.txt";
/// Holds `"<percent>%"`
pub const PROGRESS_FILE: &str = "progress.txt";
/// Combined converter output
pub const CONVERT_LOG_FILE: &str = "convert.txt";

/// Percentage of `step` out of `steps`, rounded down.
///
/// A zero denominator yields the starting value.
pub fn progress_percent(step: usize, steps: usize) -> u32 {
    if steps == 0 {
        return 0;
    }
    let pct = (100 * step.min(steps)) / steps;
    u32::try_from(pct).unwrap_or(100)
}

/// Filesystem-backed ledger of job state.
///
/// Reads are authoritative: an absent sentinel is meaningful, never an error.
/// Writes other than workspace creation are best effort; failures are logged
/// and swallowed.
#[async_trait]
pub trait JobStateStore: Send + Sync {
    /// Absolute directory for a workspace
    fn workspace_dir(&self, ws: &WorkspacePath) -> PathBuf;

    async fn exists(&self, ws: &WorkspacePath) -> bool;
    async fn is_done(&self, ws: &WorkspacePath) -> bool;
    async fn is_failed(&self, ws: &WorkspacePath) -> bool;
    async fn is_in_progress(&self, ws: &WorkspacePath) -> bool;

    /// True when the workspace holds a recognizable job.
    ///
    /// A directory without any sentinel is reclaimed as a side effect.
    async fn is_valid_state(&self, ws: &WorkspacePath) -> bool;

    /// Create the workspace and mark it 0% complete.
    async fn create(&self, ws: &WorkspacePath) -> Result<PathBuf>;

    /// Raw progress text, if readable and non-empty
    async fn read_progress(&self, ws: &WorkspacePath) -> Option<String>;

    /// Output path recorded in the done sentinel, with legacy paths rewritten
    async fn read_output(&self, ws: &WorkspacePath) -> Option<PathBuf>;

    async fn record_progress(&self, ws: &WorkspacePath, step: usize, steps: usize);
    async fn record_done(&self, ws: &WorkspacePath, output: &Path);
    async fn record_failed(&self, ws: &WorkspacePath, message: &str);
    async fn record_converter_output(&self, ws: &WorkspacePath, output: &[u8]);

    /// Move the workspace out of the way so a fresh job can start there.
    ///
    /// Returns the location it was moved to, which still needs removing, or
    /// `None` when the workspace was deleted in place or never existed.
    async fn retire(&self, ws: &WorkspacePath) -> Result<Option<PathBuf>>;

    /// Delete the workspace, retrying per `policy`.
    async fn remove(&self, ws: &WorkspacePath, policy: RemovalPolicy) -> Result<()>;
}

/// [`JobStateStore`] backed by sentinel files under a storage root
#[derive(Debug, Clone)]
pub struct SentinelStore {
    root: PathBuf,
    legacy_prefix: String,
}

impl SentinelStore {
    pub fn new(root: impl Into<PathBuf>, legacy_prefix: impl Into<String>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            legacy_prefix: legacy_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sentinel(&self, ws: &WorkspacePath, name: &str) -> PathBuf {
        self.workspace_dir(ws).join(name)
    }

    async fn write_best_effort(&self, ws: &WorkspacePath, name: &str, contents: &[u8]) {
        let path = self.sentinel(ws, name);
        if let Err(e) = tokio::fs::write(&path, contents).await {
            warn!("Unable to write {}: {}", path.display(), e);
        }
    }
}

/// Map a recorded output path onto the current storage root when it uses the
/// legacy relative prefix.
pub fn rewrite_legacy_path(recorded: &str, root: &Path, legacy_prefix: &str) -> PathBuf {
    if legacy_prefix.is_empty() {
        return PathBuf::from(recorded);
    }
    match recorded.strip_prefix(legacy_prefix) {
        Some(rest) => root.join(rest),
        None => PathBuf::from(recorded),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

#[async_trait]
impl JobStateStore for SentinelStore {
    fn workspace_dir(&self, ws: &WorkspacePath) -> PathBuf {
        self.root.join(ws.as_str())
    }

    async fn exists(&self, ws: &WorkspacePath) -> bool {
        tokio::fs::metadata(self.workspace_dir(ws))
            .await
            .is_ok_and(|m| m.is_dir())
    }

    async fn is_done(&self, ws: &WorkspacePath) -> bool {
        is_file(&self.sentinel(ws, DONE_FILE)).await
    }

    async fn is_failed(&self, ws: &WorkspacePath) -> bool {
        is_file(&self.sentinel(ws, FAIL_FILE)).await
    }

    async fn is_in_progress(&self, ws: &WorkspacePath) -> bool {
        is_file(&self.sentinel(ws, PROGRESS_FILE)).await
    }

    async fn is_valid_state(&self, ws: &WorkspacePath) -> bool {
        if !self.exists(ws).await {
            return false;
        }

        if self.is_done(ws).await || self.is_failed(ws).await || self.is_in_progress(ws).await {
            return true;
        }

        let dir = self.workspace_dir(ws);
        info!("{} is in an indeterminate state; removing it", dir.display());
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Unable to remove {}: {}", dir.display(), e);
        }
        false
    }

    async fn create(&self, ws: &WorkspacePath) -> Result<PathBuf> {
        let dir = self.workspace_dir(ws);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error!("Unable to create workspace {}: {}", dir.display(), e);
            e
        })?;
        self.record_progress(ws, 0, 0).await;
        Ok(dir)
    }

    async fn read_progress(&self, ws: &WorkspacePath) -> Option<String> {
        let text = tokio::fs::read_to_string(self.sentinel(ws, PROGRESS_FILE))
            .await
            .ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    async fn read_output(&self, ws: &WorkspacePath) -> Option<PathBuf> {
        let recorded = tokio::fs::read_to_string(self.sentinel(ws, DONE_FILE))
            .await
            .ok()?;
        let recorded = recorded.trim();
        if recorded.is_empty() {
            return None;
        }
        Some(rewrite_legacy_path(recorded, &self.root, &self.legacy_prefix))
    }

    async fn record_progress(&self, ws: &WorkspacePath, step: usize, steps: usize) {
        let pct = progress_percent(step, steps);
        debug!("{}: {}%", ws, pct);
        self.write_best_effort(ws, PROGRESS_FILE, format!("{pct}%").as_bytes())
            .await;
    }

    async fn record_done(&self, ws: &WorkspacePath, output: &Path) {
        let output = output.to_string_lossy();
        self.write_best_effort(ws, DONE_FILE, output.as_bytes()).await;
    }

    async fn record_failed(&self, ws: &WorkspacePath, message: &str) {
        self.write_best_effort(ws, FAIL_FILE, message.as_bytes()).await;
    }

    async fn record_converter_output(&self, ws: &WorkspacePath, output: &[u8]) {
        self.write_best_effort(ws, CONVERT_LOG_FILE, output).await;
    }

    async fn retire(&self, ws: &WorkspacePath) -> Result<Option<PathBuf>> {
        let dir = self.workspace_dir(ws);
        if !self.exists(ws).await {
            return Ok(None);
        }

        let reclaim = self.root.join(RECLAIM_DIR);
        let target = reclaim.join(uuid::Uuid::new_v4().to_string());
        let renamed = match tokio::fs::create_dir_all(&reclaim).await {
            Ok(()) => tokio::fs::rename(&dir, &target).await,
            Err(e) => Err(e),
        };

        match renamed {
            Ok(()) => {
                debug!("Retired {} to {}", dir.display(), target.display());
                Ok(Some(target))
            }
            Err(e) => {
                warn!(
                    "Unable to move {} aside ({}); removing in place",
                    dir.display(),
                    e
                );
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => Ok(None),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    async fn remove(&self, ws: &WorkspacePath, policy: RemovalPolicy) -> Result<()> {
        remove_dir_with_backoff(&self.workspace_dir(ws), policy).await
    }
}
