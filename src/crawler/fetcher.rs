//! HTTP page fetching
//!
//! Wraps the shared reqwest client with the crawler's retry policy:
//! timeouts, 5xx responses, and other IO errors are retried with
//! exponential backoff, while 4xx responses are terminal and returned
//! after a single attempt.

use crate::config::FetchConfig;
use crate::{CrawlError, Result};
use reqwest::Client;
use std::time::Duration;

/// Result of a completed fetch
///
/// `success` is false for 4xx responses, which carry no body.
#[derive(Debug)]
pub struct FetchResult {
    /// Decoded response body, present only on success
    pub body: Option<String>,

    /// HTTP status code of the final response
    pub status_code: u16,

    /// Size of the (possibly truncated) body in bytes
    pub content_length: usize,

    /// Whether the fetch produced a usable document
    pub success: bool,
}

/// Builds the HTTP client shared by the fetcher and the robots cache
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Fetches pages with bounded retry and exponential backoff
pub struct PageFetcher {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
    max_body_size: usize,
}

impl PageFetcher {
    /// Creates a fetcher over the shared client
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_body_size: config.max_body_size_bytes,
        }
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Policy
    ///
    /// | Condition        | Action                                    |
    /// |------------------|-------------------------------------------|
    /// | 2xx              | Return body                               |
    /// | 4xx              | Return immediately, success = false       |
    /// | 5xx              | Retry with backoff                        |
    /// | Timeout          | Retry with backoff                        |
    /// | Other IO error   | Retry with backoff                        |
    ///
    /// Backoff before retry attempt N is `retry_base_delay * 2^(N-1)`.
    /// When every attempt fails, the last error is returned.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let mut last_error: Option<CrawlError> = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_base_delay * 2u32.pow(attempt - 1);
                tracing::trace!("Backing off {:?} before retrying {}", backoff, url);
                tokio::time::sleep(backoff).await;
            }

            tracing::debug!("Fetching URL (attempt {}): {}", attempt + 1, url);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        // 4xx will not improve on retry
                        tracing::debug!("HTTP {} for {}, not retrying", status.as_u16(), url);
                        return Ok(FetchResult {
                            body: None,
                            status_code: status.as_u16(),
                            content_length: 0,
                            success: false,
                        });
                    }

                    if status.is_server_error() {
                        tracing::warn!(
                            "HTTP error {} fetching URL (attempt {}): {}",
                            status.as_u16(),
                            attempt + 1,
                            url
                        );
                        last_error = Some(CrawlError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt + 1,
                            message: format!("HTTP {}", status.as_u16()),
                        });
                        continue;
                    }

                    match response.bytes().await {
                        Ok(bytes) => {
                            let truncated = &bytes[..bytes.len().min(self.max_body_size)];
                            let body = String::from_utf8_lossy(truncated).into_owned();
                            let content_length = truncated.len();

                            tracing::debug!(
                                "Fetched URL: {} (status={}, size={})",
                                url,
                                status.as_u16(),
                                content_length
                            );

                            return Ok(FetchResult {
                                body: Some(body),
                                status_code: status.as_u16(),
                                content_length,
                                success: true,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed reading body (attempt {}): {} - {}",
                                attempt + 1,
                                url,
                                e
                            );
                            last_error = Some(CrawlError::Http {
                                url: url.to_string(),
                                source: e,
                            });
                            continue;
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!("Timeout fetching URL (attempt {}): {}", attempt + 1, url);
                    last_error = Some(CrawlError::Timeout {
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "IO error fetching URL (attempt {}): {} - {}",
                        attempt + 1,
                        url,
                        e
                    );
                    last_error = Some(CrawlError::Http {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CrawlError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            message: "no attempts made".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(max_retries: u32, base_delay_ms: u64) -> PageFetcher {
        let config = FetchConfig {
            request_timeout_ms: 2000,
            max_retries,
            retry_base_delay_ms: base_delay_ms,
            max_body_size_bytes: 1024 * 1024,
            user_agent: "TestBot/1.0".to_string(),
        };
        let client = build_http_client(&config.user_agent, Duration::from_millis(2000)).unwrap();
        PageFetcher::new(client, &config)
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>hello</body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 10);
        let result = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status_code, 200);
        assert!(result.body.unwrap().contains("hello"));
        assert_eq!(result.content_length, 31);
    }

    #[tokio::test]
    async fn test_404_single_attempt_no_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 10);
        let result = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.status_code, 404);
        assert!(result.body.is_none());
    }

    #[tokio::test]
    async fn test_500_retried_to_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 10);
        let result = fetcher.fetch(&format!("{}/broken", server.uri())).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            CrawlError::RetriesExhausted { message, .. } => {
                assert!(message.contains("500"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_500_then_200_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 10);
        let result = fetcher
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.body.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_backoff_is_exponential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 50);
        let start = Instant::now();
        let _ = fetcher.fetch(&format!("{}/broken", server.uri())).await;

        // Sleeps of 50ms and 100ms precede attempts two and three
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "retries finished after only {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_connection_refused_retried_then_error() {
        // Nothing listens on this port
        let fetcher = test_fetcher(2, 10);
        let result = fetcher.fetch("http://127.0.0.1:9/page").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_body_truncated_to_max_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            request_timeout_ms: 2000,
            max_retries: 1,
            retry_base_delay_ms: 10,
            max_body_size_bytes: 100,
            user_agent: "TestBot/1.0".to_string(),
        };
        let client = build_http_client(&config.user_agent, Duration::from_secs(2)).unwrap();
        let fetcher = PageFetcher::new(client, &config);

        let result = fetcher
            .fetch(&format!("{}/big", server.uri()))
            .await
            .unwrap();

        assert_eq!(result.content_length, 100);
        assert_eq!(result.body.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_redirect_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3, 10);
        let result = fetcher
            .fetch(&format!("{}/old", server.uri()))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.body.unwrap(), "moved here");
    }
}
