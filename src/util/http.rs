use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use thiserror::Error;

/// Desktop Chrome user agent; several publishers serve stripped pages to
/// unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Errors shared by every network step of the pipeline.
///
/// None of these are fatal: callers log them and treat the step as having
/// produced no data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as the expected format
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// An HTML page was served where a feed was expected and it links no feed
    #[error("No RSS/Atom link found in HTML page")]
    NoFeedLink,
    /// Writing a downloaded body to disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

/// Standard navigation headers sent with every feed and page request.
pub fn browser_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(header::USER_AGENT, agent);
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers
}

/// Build the shared HTTP client.
///
/// Per-call timeouts are applied on each request; the client only bounds
/// connection setup. Redirects are followed (reqwest default policy).
pub fn build_client(user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .default_headers(browser_headers(user_agent))
        .connect_timeout(Duration::from_secs(10))
        .build()
}

/// GET `url` with the given timeout, failing on non-2xx status.
pub async fn get_checked(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<reqwest::Response, FetchError> {
    let response = tokio::time::timeout(timeout, client.get(url).timeout(timeout).send())
        .await
        .map_err(|_| FetchError::Timeout)??;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    Ok(response)
}

/// Read a response body, rejecting anything larger than `limit` bytes.
pub async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Lowercased `Content-Type` of a response, or empty.
pub fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_browser_headers_falls_back_on_invalid_agent() {
        let headers = browser_headers("bad\nagent");
        assert_eq!(
            headers.get(header::USER_AGENT).unwrap(),
            DEFAULT_USER_AGENT
        );
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
    }

    #[tokio::test]
    async fn test_client_sends_browser_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_eq("sec-fetch-mode", "navigate"))
            .and(header_eq("upgrade-insecure-requests", "1"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = build_client(DEFAULT_USER_AGENT).unwrap();
        let response = get_checked(&client, &mock_server.uri(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(read_limited_bytes(response, 1024).await.unwrap(), b"ok");

        // Values containing commas are compared on the recorded request
        let requests = mock_server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        assert_eq!(
            headers.get("user-agent").unwrap().to_str().unwrap(),
            DEFAULT_USER_AGENT
        );
        assert_eq!(
            headers.get("accept-language").unwrap().to_str().unwrap(),
            "en-US,en;q=0.9"
        );
    }

    #[tokio::test]
    async fn test_get_checked_rejects_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = get_checked(&client, &mock_server.uri(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_get_checked_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = get_checked(&client, &mock_server.uri(), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_read_limited_bytes_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let response = get_checked(&client, &mock_server.uri(), Duration::from_secs(5))
            .await
            .unwrap();
        let result = read_limited_bytes(response, 16).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge(16))));
    }
}
