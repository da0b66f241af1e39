//! Page fetching over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Realistic browser user agent. Registry sites commonly block default
/// client identifiers outright.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Typed fetch failure. Never escapes as a panic or a raw transport error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
}

/// Capability to fetch one page of a paginated source by page number.
///
/// The pagination controller only depends on this seam, so tests can drive
/// the state machine with canned pages.
#[async_trait]
pub trait FetchPage: Send + Sync {
    async fn fetch(&self, page: u32) -> Result<Vec<u8>, FetchError>;
}

/// HTTP page fetcher appending a page-number query parameter to a base URL.
///
/// Does not retry internally; the retry budget belongs to the pagination
/// controller so a fetch failure aborts only that source's pagination.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    base_url: String,
    page_param: String,
    request_delay: Duration,
}

impl HttpPageFetcher {
    /// Create a fetcher for one source.
    /// - `user_agent`: None uses the built-in browser user agent.
    pub fn new(
        base_url: &str,
        page_param: &str,
        timeout: Duration,
        request_delay: Duration,
        user_agent: Option<&str>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.to_string(),
            page_param: page_param.to_string(),
            request_delay,
        }
    }

    /// Build the paginated URL for a page number.
    fn page_url(&self, page: u32) -> String {
        match url::Url::parse(&self.base_url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair(&self.page_param, &page.to_string());
                url.to_string()
            }
            // Not parseable as a URL; let the HTTP client report it.
            Err(_) => {
                let separator = if self.base_url.contains('?') { '&' } else { '?' };
                format!("{}{}{}={}", self.base_url, separator, self.page_param, page)
            }
        }
    }
}

#[async_trait]
impl FetchPage for HttpPageFetcher {
    async fn fetch(&self, page: u32) -> Result<Vec<u8>, FetchError> {
        // Politeness gap between consecutive requests to the same site.
        // Applied before the request rather than after it, so the last page
        // of a source does not end the run with a dead sleep.
        if page > 1 && !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let url = self.page_url(page);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify_error)?;
        Ok(body.to_vec())
    }
}

fn classify_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(base_url: &str, page_param: &str) -> HttpPageFetcher {
        HttpPageFetcher::new(
            base_url,
            page_param,
            DEFAULT_TIMEOUT,
            Duration::ZERO,
            None,
        )
    }

    #[test]
    fn test_page_url_appends_to_existing_query() {
        let f = fetcher("https://example.gov/list?intmId=13", "pageNo");
        assert_eq!(
            f.page_url(3),
            "https://example.gov/list?intmId=13&pageNo=3"
        );
    }

    #[test]
    fn test_page_url_starts_query_when_absent() {
        let f = fetcher("https://example.gov/list", "page");
        assert_eq!(f.page_url(1), "https://example.gov/list?page=1");
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Timeout.to_string(), "request timed out");
        assert_eq!(
            FetchError::HttpStatus(503).to_string(),
            "unexpected HTTP status 503"
        );
    }
}
