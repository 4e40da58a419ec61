use crate::extract::ExtractionEngine;
use crate::util::{get_checked, read_limited_bytes, FetchError};
use std::time::Duration;

const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Fetches article pages and runs them through the extraction engine.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Raw HTML of `url`, decoded lossily as UTF-8.
    pub async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = get_checked(&self.client, url, self.timeout).await?;
        let bytes = read_limited_bytes(response, MAX_PAGE_SIZE).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Offline content for `url`.
    ///
    /// A matching recipe's output is returned when extraction succeeds,
    /// otherwise the raw page. `None` means the fetch itself failed, which
    /// callers must keep distinct from a page no recipe understood.
    pub async fn fetch(
        &self,
        url: &str,
        engine: &ExtractionEngine,
        image_url: Option<&str>,
    ) -> Option<String> {
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Page fetch failed");
                return None;
            }
        };

        Some(engine.process(url, &html, image_url).unwrap_or(html))
    }
}
