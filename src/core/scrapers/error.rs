//! Scraper Error Types
//!
//! Domain-specific error types for organiser scrapers. Retryability drives
//! the scrape-job queue: transport, server-side and browser failures requeue,
//! parse failures do not.

use crate::core::fetch::FetchError;
use thiserror::Error;

/// Comprehensive error type for scraper operations
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Network failure before a usable response
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// HTTP error status code from the organiser
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Response did not match the expected shape; fatal only when no rows
    /// parsed at all
    #[error("Failed to parse {format} from {url}: {message}")]
    Parse {
        format: String, // "HTML", "JSON"
        url: String,
        message: String,
    },

    /// The page yielded zero result rows
    #[error("No results parsed from {url}")]
    NoRows { url: String },

    /// Headless browser launch, navigation or selector failure
    #[error("Browser error on {url}: {message}")]
    Browser { url: String, message: String },

    /// No registered scraper matches the URL
    #[error("No scraper matches {url}")]
    NoScraper { url: String },

    /// The job observed its cancel flag at a page boundary
    #[error("Scrape cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn parse(
        format: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format: format.into(),
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn browser(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browser {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether the retry queue should schedule another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Browser { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429 || *status == 404,
            Self::Parse { .. } | Self::NoRows { .. } | Self::NoScraper { .. } => false,
            Self::Cancelled => false,
        }
    }
}

impl From<FetchError> for ScrapeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::HttpStatus { status, url } => Self::HttpStatus { status, url },
            FetchError::Transport { url, source } => Self::Transport {
                url,
                message: source.to_string(),
            },
        }
    }
}

/// Result type alias for scraper operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScrapeError::transport("https://x.example.com", "reset").is_retryable());
        assert!(ScrapeError::browser("https://x.example.com", "launch failed").is_retryable());
        assert!(ScrapeError::HttpStatus {
            status: 503,
            url: "u".to_string()
        }
        .is_retryable());
        assert!(!ScrapeError::parse("JSON", "u", "bad key").is_retryable());
        assert!(!ScrapeError::Cancelled.is_retryable());
        assert!(!ScrapeError::NoScraper { url: "u".to_string() }.is_retryable());
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: ScrapeError = FetchError::HttpStatus {
            status: 404,
            url: "https://x.example.com/e/1".to_string(),
        }
        .into();
        assert!(matches!(err, ScrapeError::HttpStatus { status: 404, .. }));
    }
}
