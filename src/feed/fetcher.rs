use crate::feed::discovery::find_feed_link;
use crate::feed::parser::{parse_feed, FetchedFeed};
use crate::storage::ArticleDraft;
use crate::util::{content_type, get_checked, read_limited_bytes, FetchError};
use std::time::Duration;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// What a response's `Content-Type` says about its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Feed,
    Html,
    Unknown,
}

impl BodyKind {
    fn from_content_type(content_type: &str) -> Self {
        if content_type.contains("application/rss+xml")
            || content_type.contains("application/atom+xml")
            || content_type.contains("application/xml")
            || content_type.contains("text/xml")
        {
            BodyKind::Feed
        } else if content_type.contains("text/html") || content_type.contains("application/xhtml")
        {
            BodyKind::Html
        } else {
            BodyKind::Unknown
        }
    }
}

/// Retrieves and parses RSS/Atom feeds, following an HTML page's feed link once.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch and parse the feed at `url`.
    ///
    /// Any failure is logged and yields `None`, which callers treat as "no
    /// data this cycle" and must not confuse with an empty feed.
    pub async fn fetch(&self, url: &str) -> Option<FetchedFeed> {
        match self.try_fetch(url).await {
            Ok(feed) => {
                tracing::debug!(url = %url, articles = feed.articles.len(), "Feed fetched");
                Some(feed)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Feed fetch failed");
                None
            }
        }
    }

    /// Article drafts from the feed at `url`; empty on any failure.
    pub async fn fetch_articles(&self, url: &str) -> Vec<ArticleDraft> {
        self.fetch(url).await.map(|f| f.articles).unwrap_or_default()
    }

    /// Fetch and parse the feed at `url`, surfacing the failure.
    ///
    /// An HTML response is scanned for a feed link, which is fetched once and
    /// parsed whatever its content type. A response without a usable content
    /// type is tried as a feed first, then as HTML.
    pub async fn try_fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let (kind, bytes) = self.get(url).await?;

        match kind {
            BodyKind::Feed => parse_feed(&bytes),
            BodyKind::Html => self.follow_feed_link(&bytes, url).await,
            BodyKind::Unknown => match parse_feed(&bytes) {
                Ok(feed) => Ok(feed),
                Err(_) => self.follow_feed_link(&bytes, url).await,
            },
        }
    }

    async fn follow_feed_link(
        &self,
        html: &[u8],
        page_url: &str,
    ) -> Result<FetchedFeed, FetchError> {
        let html = String::from_utf8_lossy(html);
        let feed_url = find_feed_link(&html, page_url).ok_or(FetchError::NoFeedLink)?;
        tracing::info!(page = %page_url, feed = %feed_url, "Discovered feed link in HTML page");

        let (_, bytes) = self.get(&feed_url).await?;
        parse_feed(&bytes)
    }

    async fn get(&self, url: &str) -> Result<(BodyKind, Vec<u8>), FetchError> {
        let response = get_checked(&self.client, url, self.timeout).await?;
        let kind = BodyKind::from_content_type(&content_type(&response));
        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        Ok((kind, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example Blog</title>
    <item><title>Test</title><link>https://example.com/post/1</link></item>
</channel></rss>"#;

    fn fetcher() -> FeedFetcher {
        FeedFetcher::new(reqwest::Client::new(), Duration::from_secs(5))
    }

    #[test]
    fn test_body_kind_from_content_type() {
        assert_eq!(
            BodyKind::from_content_type("application/rss+xml; charset=utf-8"),
            BodyKind::Feed
        );
        assert_eq!(BodyKind::from_content_type("text/xml"), BodyKind::Feed);
        assert_eq!(BodyKind::from_content_type("text/html"), BodyKind::Html);
        assert_eq!(BodyKind::from_content_type(""), BodyKind::Unknown);
        assert_eq!(BodyKind::from_content_type("text/plain"), BodyKind::Unknown);
    }

    #[tokio::test]
    async fn test_direct_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(VALID_RSS, "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let feed = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Blog"));
        assert_eq!(feed.articles.len(), 1);
        assert_eq!(feed.articles[0].url, "https://example.com/post/1");
    }

    #[tokio::test]
    async fn test_html_page_discovers_linked_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(
                        r#"<html><head><link rel="alternate" type="application/rss+xml" href="/feed.xml"></head></html>"#,
                        "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let feed = fetcher()
            .fetch(&format!("{}/news", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(feed.articles.len(), 1);
    }

    #[tokio::test]
    async fn test_html_without_feed_link_fails_without_guessing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>Just a page</body></html>", "text/html"),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        // Two calls, one request each; no guessed feed paths are tried
        let url = format!("{}/page", mock_server.uri());
        let result = fetcher().try_fetch(&url).await;
        assert!(matches!(result, Err(FetchError::NoFeedLink)));
        assert!(fetcher().fetch_articles(&url).await.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_is_followed_only_once() {
        let mock_server = MockServer::start().await;
        // Both pages point at each other; only one hop is taken
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<link type="application/rss+xml" href="/b">"#, "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<link type="application/rss+xml" href="/a">"#, "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .try_fetch(&format!("{}/a", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_ambiguous_content_type_tries_feed_first() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let feed = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(feed.articles[0].title, "Test");
    }

    #[tokio::test]
    async fn test_error_status_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(fetcher().fetch(&mock_server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_feed_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<not valid xml", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let result = fetcher().try_fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_feed_is_some() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(
                        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>E</title></channel></rss>"#,
                        "application/xml",
                    ),
            )
            .mount(&mock_server)
            .await;

        let feed = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert!(feed.articles.is_empty());
    }
}
