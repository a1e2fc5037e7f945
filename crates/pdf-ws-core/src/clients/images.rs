use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ImageConfig;
use crate::error::{Error, Result};
use crate::util::fill_template;
use super::traits::ImageFetcher;

/// Downloads page derivatives from an IIIF image server
pub struct IiifImageFetcher {
    client: Client,
    /// Image URL with a `{PID}` placeholder
    pub url_template: String,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

enum Attempt {
    Retry(Error),
    Fatal(Error),
}

impl IiifImageFetcher {
    pub fn new(client: Client, url_template: impl Into<String>, max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn from_config(client: Client, config: &ImageConfig) -> Self {
        Self::new(
            client,
            config.url_template.clone().unwrap_or_default(),
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        )
    }

    async fn attempt(&self, url: &str, pid: &str, dest: &Path) -> std::result::Result<u64, Attempt> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(Error::ImageRequest(e.to_string())))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Attempt::Fatal(Error::ImageNotFound(pid.to_string()))),
            status if !status.is_success() => {
                return Err(Attempt::Retry(Error::ImageRequest(format!("HTTP {status}"))));
            }
            _ => {}
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Attempt::Fatal(e.into()))?;

        let mut size = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Attempt::Retry(Error::ImageRequest(e.to_string())))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| Attempt::Fatal(e.into()))?;
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Attempt::Fatal(e.into()))?;

        Ok(size)
    }
}

async fn discard_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!("Unable to remove partial download {}: {}", dest.display(), e);
    }
}

#[async_trait]
impl ImageFetcher for IiifImageFetcher {
    async fn fetch(&self, pid: &str, dir: &Path) -> Result<PathBuf> {
        let url = fill_template(&self.url_template, "{PID}", pid);
        let dest = dir.join(format!("{pid}.jpg"));
        let mut backoff = self.initial_backoff;
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!(
                "Image download attempt {}/{} from {}",
                attempt, self.max_attempts, url
            );

            match self.attempt(&url, pid, &dest).await {
                Ok(size) => {
                    info!("Downloaded {} ({} bytes)", dest.display(), size);
                    return Ok(dest);
                }
                Err(Attempt::Fatal(e)) => {
                    warn!("Image download for {} failed: {}", pid, e);
                    discard_partial(&dest).await;
                    return Err(e);
                }
                Err(Attempt::Retry(e)) => {
                    warn!(
                        "Image download attempt {}/{} for {} failed: {}",
                        attempt, self.max_attempts, pid, e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        if let Some(e) = last_error {
            debug!("Last image error for {}: {}", pid, e);
        }
        discard_partial(&dest).await;
        Err(Error::ImageMaxRetriesExceeded {
            pid: pid.to_string(),
            attempts: self.max_attempts,
        })
    }
}
