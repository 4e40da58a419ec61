use crate::util::{get_checked, temp_sibling, FetchError};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MAX_IMAGE_SIZE: usize = 20 * 1024 * 1024; // 20MB
const IMAGE_EXTENSION: &str = "jpg";

/// Content-addressed on-disk image store keyed by source URL.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            client,
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path an image URL is stored under, whether or not it exists yet.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{digest:x}.{IMAGE_EXTENSION}"))
    }

    /// Download `url` into the cache and return its local path.
    ///
    /// An already cached file is returned without touching the network.
    /// Failures are logged and yield `None`.
    pub async fn download(&self, url: &str) -> Option<PathBuf> {
        match self.try_download(url).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Image download failed");
                None
            }
        }
    }

    async fn try_download(&self, url: &str) -> Result<PathBuf, FetchError> {
        let path = self.path_for(url);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(url = %url, path = %path.display(), "Image already cached");
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let response = get_checked(&self.client, url, self.timeout).await?;

        if let Some(len) = response.content_length() {
            if len as usize > MAX_IMAGE_SIZE {
                return Err(FetchError::ResponseTooLarge(MAX_IMAGE_SIZE));
            }
        }

        // Stream into a sibling temp file so the final path is only ever complete
        let temp_path = temp_sibling(&path);
        let result = stream_to_file(response, &temp_path).await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
        tokio::fs::rename(&temp_path, &path).await?;

        tracing::debug!(url = %url, path = %path.display(), "Image cached");
        Ok(path)
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<(), FetchError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0usize;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written = written.saturating_add(chunk.len());
        if written > MAX_IMAGE_SIZE {
            return Err(FetchError::ResponseTooLarge(MAX_IMAGE_SIZE));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache(dir: &Path) -> ImageCache {
        ImageCache::new(
            dir.join("images"),
            reqwest::Client::new(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_second_download_reuses_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let url = format!("{}/photo.jpg", mock_server.uri());

        let first = cache.download(&url).await.unwrap();
        let second = cache.download(&url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, cache.path_for(&url));
        assert_eq!(std::fs::read(&first).unwrap(), vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_downloads_of_same_url_both_succeed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/shared.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let url = format!("{}/shared.jpg", mock_server.uri());

        let (a, b) = futures::join!(cache.download(&url), cache.download(&url));

        assert_eq!(a, Some(cache.path_for(&url)));
        assert_eq!(b, a);
        assert_eq!(std::fs::read(cache.path_for(&url)).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
        // No staging files left behind
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_error_status_yields_none_and_no_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        let url = format!("{}/missing.jpg", mock_server.uri());

        assert_eq!(cache.download(&url).await, None);
        assert!(!cache.path_for(&url).exists());
    }

    #[test]
    fn test_path_is_hex_digest_with_fixed_extension() {
        let cache = ImageCache::new("/data/images", reqwest::Client::new(), Duration::from_secs(1));
        let path = cache.path_for("https://example.com/a.png");
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(path.starts_with("/data/images"));
        assert_eq!(name.len(), 64 + ".jpg".len());
        assert!(name.ends_with(".jpg"));
        assert_ne!(path, cache.path_for("https://example.com/b.png"));
    }
}
