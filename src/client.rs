use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::DownloadError;
use crate::manga::page::{ByteStream, Fetch};

pub const USER_AGENT: &str = concat!("tcb-dl/", env!("CARGO_PKG_VERSION"));

/// The one HTTP client shared by the scraper and every page download.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches a listing page as text.
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        debug!(url, "fetching listing page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DownloadError::source_unavailable(url, e))?;

        response
            .text()
            .await
            .map_err(|e| DownloadError::source_unavailable(url, e))
    }
}

#[async_trait]
impl Fetch for HttpClient {
    async fn fetch(&self, url: &str) -> Result<ByteStream, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DownloadError::fetch_failed(url, e))?;

        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| DownloadError::fetch_failed(url.as_str(), e))
            })
            .boxed())
    }
}
