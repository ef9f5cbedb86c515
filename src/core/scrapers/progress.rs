//! Scrape progress reporting
//!
//! Scrapers push progress tokens into a bounded channel; the caller drains
//! them out-of-band. Intermediate updates are dropped under back-pressure,
//! terminal stages (complete, error) are always delivered.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Pipeline stage of a running scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Initializing,
    Connecting,
    DetectingPages,
    Scraping,
    Validating,
    Saving,
    Complete,
    Error,
}

impl ProgressStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::DetectingPages => "detecting_pages",
            Self::Scraping => "scraping",
            Self::Validating => "validating",
            Self::Saving => "saving",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub results_scraped: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub percent_complete: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProgressUpdate {
    pub fn stage(stage: ProgressStage) -> Self {
        Self {
            stage,
            results_scraped: 0,
            total_pages: 0,
            current_page: 0,
            percent_complete: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn scraping(results_scraped: usize, current_page: usize, total_pages: usize) -> Self {
        let percent = if total_pages > 0 {
            ((current_page * 100) / total_pages).min(100) as u8
        } else {
            0
        };
        Self {
            stage: ProgressStage::Scraping,
            results_scraped,
            total_pages,
            current_page,
            percent_complete: percent,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Buffered progress tokens per scrape before intermediate updates drop
const PROGRESS_BUFFER: usize = 64;

/// Sending half handed to a scraper
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ProgressSender {
    /// Create a connected progress channel
    pub fn channel() -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sender that discards everything (callers that don't observe progress)
    pub fn noop() -> Self {
        Self { tx: None }
    }

    /// Push an intermediate update; dropped when the observer lags
    pub fn update(&self, update: ProgressUpdate) {
        debug_assert!(!update.stage.is_terminal(), "terminal stages go through finish()");
        if let Some(tx) = &self.tx {
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(update) {
                tracing::trace!("Progress observer lagging, dropping intermediate update");
            }
        }
    }

    /// Deliver a terminal stage. Waits for channel capacity rather than drop.
    pub async fn finish(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.tx {
            if tx.send(update).await.is_err() {
                tracing::trace!("Progress observer dropped before terminal stage");
            }
        }
    }
}
