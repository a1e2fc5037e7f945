use std::future::Future;
use std::io;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::RemovalPolicy;
use crate::error::{Error, Result};

/// Recursively delete `path`, retrying with a linearly growing delay.
///
/// Attempt `i` (0-indexed) is preceded by a wait of `i * policy.step`. A path
/// that is already gone counts as removed.
pub async fn remove_dir_with_backoff(path: &Path, policy: RemovalPolicy) -> Result<()> {
    let owned = path.to_path_buf();
    retry_removal(path, policy, || tokio::fs::remove_dir_all(owned.clone())).await
}

async fn retry_removal<F, Fut>(path: &Path, policy: RemovalPolicy, mut remove: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    for (attempt, wait) in policy.schedule().into_iter().enumerate() {
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        match remove().await {
            Ok(()) => {
                info!("Deleted {} on attempt {}", path.display(), attempt + 1);
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} already removed", path.display());
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Delete attempt {}/{} for {} failed: {}",
                    attempt + 1,
                    policy.max_attempts,
                    path.display(),
                    e
                );
            }
        }
    }

    error!(
        "Delete failed for {}; max attempts ({}) reached",
        path.display(),
        policy.max_attempts
    );
    Err(Error::RemovalExhausted {
        path: path.to_path_buf(),
        attempts: policy.max_attempts,
    })
}
