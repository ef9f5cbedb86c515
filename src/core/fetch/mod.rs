//! Shared HTTP Fetcher
//!
//! A single pooled client with a stable User-Agent serves every scraper and
//! the endpoint monitor. The fetcher classifies failures but never retries;
//! retry policy belongs to the scrape-job queue.

use once_cell::sync::Lazy;
use std::time::Duration;
use thiserror::Error;

/// Stable User-Agent sent on every request
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default request timeout for page fetches
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Shared HTTP client for all scrapers and the monitor.
///
/// Lazily initialised; reuses TCP connections across requests. Per-request
/// timeouts are applied at call sites so the monitor can run tighter than
/// the scrapers.
static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .expect("Failed to create shared HTTP client")
});

/// Get the shared HTTP client
pub fn get_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Error type for a single fetch
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with 4xx/5xx; the code is preserved for retry
    /// classification upstream
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// DNS, TCP, TLS or timeout failure before a usable response
    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    /// Transport errors and server-side statuses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// A fetched page: body bytes plus the status that delivered them
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// GET a URL with the default 60s timeout
pub async fn fetch_page(url: &str) -> Result<FetchedPage, FetchError> {
    fetch_with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
}

/// GET a URL with an explicit timeout.
///
/// Any status below 400 is treated as body-bearing; 4xx/5xx map to
/// [`FetchError::HttpStatus`] with the code preserved.
pub async fn fetch_with_timeout(url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
    let response = get_client()
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status().as_u16();
    if status >= 400 {
        return Err(FetchError::HttpStatus {
            status,
            url: url.to_string(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?
        .to_vec();

    tracing::debug!(url, status, bytes = body.len(), "Fetched page");

    Ok(FetchedPage {
        url: url.to_string(),
        status,
        body,
    })
}
