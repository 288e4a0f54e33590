use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Url;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DownloadError;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, DownloadError>>;

/// Anything that can open a byte stream for an image url.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ByteStream, DownloadError>;
}

/// File name of the `index`th (1-based) page of a chapter, e.g. `007.jpg`.
///
/// The extension is the one of the url's path, dot included, or nothing.
pub fn page_file_name(index: usize, url: &str) -> String {
    format!("{:03}{}", index, url_extension(url))
}

fn url_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(url) => url.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let name = path.rsplit('/').next().unwrap_or_default();
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// One image to fetch and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub url: String,
    pub path: PathBuf,
}

impl DownloadJob {
    pub fn new(index: usize, url: String, directory: &Path) -> Self {
        Self {
            path: directory.join(page_file_name(index, &url)),
            url,
        }
    }
}

/// Runs page downloads. Clones share the same concurrency limit and
/// cancellation token.
#[derive(Clone)]
pub struct PageDownloader {
    fetcher: Arc<dyn Fetch>,
    limit: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl PageDownloader {
    pub fn new(fetcher: Arc<dyn Fetch>, max_concurrent: usize, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Downloads a single page, truncating any existing file.
    /// A page that fails or gets cancelled leaves no file behind.
    pub async fn download(&self, job: &DownloadJob) -> Result<u64, DownloadError> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DownloadError::Cancelled),
            result = self.transfer(job) => result,
        };

        if let Err(error) = &result {
            debug!(url = %job.url, %error, "page download failed");
            if let Err(e) = tokio::fs::remove_file(&job.path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %job.path.display(), error = %e, "could not remove partial page");
                }
            }
        }
        result
    }

    async fn transfer(&self, job: &DownloadJob) -> Result<u64, DownloadError> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|_| DownloadError::Cancelled)?;

        let mut stream = self.fetcher.fetch(&job.url).await?;
        let mut file = File::create(&job.path)
            .await
            .map_err(|e| DownloadError::write_failed(&job.path, e))?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::write_failed(&job.path, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| DownloadError::write_failed(&job.path, e))?;

        debug!(url = %job.url, bytes = written, "page saved");
        Ok(written)
    }
}
