//! Organiser Scrapers
//!
//! Each organiser gets one capability-tagged scraper implementing
//! [`OrganiserScraper`]. Selection is by organiser hint first, then URL
//! predicate over the registered set. The scraped payload is a serialisable
//! envelope the ingestion coordinator persists.

pub mod error;
pub mod evochip;
pub mod fields;
pub mod hopasports;
pub mod progress;
pub mod table;
pub mod validator;

use crate::core::types::{CheckpointKind, RaceType, ResultStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use error::{ScrapeError, ScrapeResult};
pub use progress::{ProgressSender, ProgressStage, ProgressUpdate};
pub use validator::{validate_results, ValidationReport};

// ============================================================================
// Scraped payload envelope
// ============================================================================

/// Event metadata extracted from the organiser page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedEvent {
    pub url: String,
    pub organiser: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub distances: Vec<ScrapedDistance>,
}

/// One distance offered by the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedDistance {
    pub name: String,
    pub distance_meters: u32,
    pub race_type: RaceType,
    #[serde(default)]
    pub expected_checkpoints: Vec<String>,
}

/// A timing point on one scraped result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCheckpoint {
    pub name: String,
    pub kind: CheckpointKind,
    /// 1-based position along the course
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_distance_meters: Option<i64>,
}

/// One parsed result row, in provider order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bib: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gun_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chip_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default)]
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_behind: Option<String>,
    /// Name of the distance this row belongs to, when the event has several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_name: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<ScrapedCheckpoint>,
    /// Logical fields the source populated, for provenance
    #[serde(default)]
    pub fields_provided: Vec<String>,
}

/// Bookkeeping for one scrape run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_pages: usize,
    pub total_results: usize,
    pub used_headless_browser: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Full scrape output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedResults {
    pub event: ScrapedEvent,
    pub results: Vec<ScrapedResult>,
    pub scrape_metadata: ScrapeMetadata,
}

// ============================================================================
// Options, capabilities, analysis
// ============================================================================

/// Cooperative cancellation flag observed at page boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-scrape options
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Minimum wall-clock delay between page requests to one organiser
    pub politeness_delay_ms: u64,
    /// Hard cap on pages fetched in one run
    pub max_pages: Option<usize>,
    /// Whether the headless fallback may be used
    pub allow_headless: bool,
    pub cancel: CancelFlag,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            politeness_delay_ms: 500,
            max_pages: None,
            allow_headless: true,
            cancel: CancelFlag::new(),
        }
    }
}

/// What a scraper can do, declared up front
#[derive(Debug, Clone, Default)]
pub struct ScraperCapabilities {
    pub supports_headless: bool,
    pub supports_pagination: bool,
    pub supports_multiple_distances: bool,
    pub supports_checkpoints: bool,
    /// Expected checkpoint names keyed by distance name
    pub expected_checkpoints: HashMap<String, Vec<String>>,
}

/// Lightweight pre-scrape probe result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlAnalysis {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organiser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_distances: usize,
    #[serde(default)]
    pub estimated_results: usize,
    pub requires_headless: bool,
}

impl UrlAnalysis {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            organiser: None,
            event_name: None,
            event_date: None,
            estimated_distances: 0,
            estimated_results: 0,
            requires_headless: false,
        }
    }
}

/// One result in an athlete's scraped history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResult {
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Paginated per-athlete result history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedAthleteProfile {
    pub name: String,
    pub results: Vec<ProfileResult>,
    pub total_pages: usize,
}

// ============================================================================
// Scraper trait and selection
// ============================================================================

/// Capability-tagged extractor for a single organiser
#[async_trait]
pub trait OrganiserScraper: Send + Sync {
    /// Organiser tag ("hopasports", "evochip")
    fn organiser(&self) -> &'static str;

    /// Whether this scraper handles the URL
    fn matches_url(&self, url: &str) -> bool;

    fn capabilities(&self) -> ScraperCapabilities;

    /// Lightweight pre-scrape probe
    async fn analyze_url(&self, url: &str) -> ScrapeResult<UrlAnalysis>;

    /// Scrape the event at `url`, reporting progress through `progress`
    async fn scrape_event(
        &self,
        url: &str,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> ScrapeResult<ScrapedResults>;

    /// Score field population and completeness for a scraped payload
    fn validate_results(&self, results: &ScrapedResults) -> ValidationReport {
        validator::validate_results(results)
    }

    /// Per-athlete result history; organisers without profile pages keep the
    /// default
    async fn scrape_athlete_profile(
        &self,
        url: &str,
    ) -> ScrapeResult<Option<ScrapedAthleteProfile>> {
        let _ = url;
        Ok(None)
    }
}

/// Select a scraper: organiser hint first, then URL predicate
pub fn select_scraper<'a>(
    scrapers: &'a [Box<dyn OrganiserScraper>],
    url: &str,
    organiser_hint: Option<&str>,
) -> ScrapeResult<&'a dyn OrganiserScraper> {
    if let Some(hint) = organiser_hint {
        if let Some(scraper) = scrapers.iter().find(|s| s.organiser() == hint) {
            return Ok(scraper.as_ref());
        }
        tracing::warn!(hint, "Organiser hint matched no scraper, falling back to URL predicate");
    }

    scrapers
        .iter()
        .find(|s| s.matches_url(url))
        .map(|s| s.as_ref())
        .ok_or_else(|| ScrapeError::NoScraper {
            url: url.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubScraper {
        tag: &'static str,
        host: &'static str,
    }

    #[async_trait]
    impl OrganiserScraper for StubScraper {
        fn organiser(&self) -> &'static str {
            self.tag
        }

        fn matches_url(&self, url: &str) -> bool {
            url.contains(self.host)
        }

        fn capabilities(&self) -> ScraperCapabilities {
            ScraperCapabilities::default()
        }

        async fn analyze_url(&self, _url: &str) -> ScrapeResult<UrlAnalysis> {
            Ok(UrlAnalysis::invalid())
        }

        async fn scrape_event(
            &self,
            url: &str,
            _options: &ScrapeOptions,
            _progress: &ProgressSender,
        ) -> ScrapeResult<ScrapedResults> {
            Err(ScrapeError::NoRows { url: url.to_string() })
        }
    }

    fn stub_registry() -> Vec<Box<dyn OrganiserScraper>> {
        vec![
            Box::new(StubScraper { tag: "hopasports", host: "hopasports" }),
            Box::new(StubScraper { tag: "evochip", host: "evochip" }),
        ]
    }

    #[test]
    fn test_select_by_hint() {
        let scrapers = stub_registry();
        let chosen =
            select_scraper(&scrapers, "https://other.example.com", Some("evochip")).unwrap();
        assert_eq!(chosen.organiser(), "evochip");
    }

    #[test]
    fn test_select_by_url_predicate() {
        let scrapers = stub_registry();
        let chosen =
            select_scraper(&scrapers, "https://results.hopasports.com/e/9", None).unwrap();
        assert_eq!(chosen.organiser(), "hopasports");
    }

    #[test]
    fn test_bad_hint_falls_back_to_url() {
        let scrapers = stub_registry();
        let chosen = select_scraper(
            &scrapers,
            "https://live.evochip.net/race/3",
            Some("unknown-tag"),
        )
        .unwrap();
        assert_eq!(chosen.organiser(), "evochip");
    }

    #[test]
    fn test_no_match_is_error() {
        let scrapers = stub_registry();
        let result = select_scraper(&scrapers, "https://unrelated.example.com", None);
        assert!(matches!(result, Err(ScrapeError::NoScraper { .. })));
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_envelope_round_trip() {
        let payload = ScrapedResults {
            event: ScrapedEvent {
                url: "https://results.hopasports.com/e/1".to_string(),
                organiser: "hopasports".to_string(),
                name: "Harbour Run".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 9, 20).unwrap(),
                location: Some("Harbourside".to_string()),
                distances: vec![ScrapedDistance {
                    name: "10K".to_string(),
                    distance_meters: 10_000,
                    race_type: RaceType::Running,
                    expected_checkpoints: vec!["5km".to_string(), "finish".to_string()],
                }],
            },
            results: vec![ScrapedResult {
                position: Some(1),
                bib: Some("42".to_string()),
                name: "Jane Doe".to_string(),
                gender: Some("F".to_string()),
                category: None,
                finish_time: Some("34:02".to_string()),
                gun_time: None,
                chip_time: None,
                pace: None,
                gender_position: Some(1),
                category_position: None,
                country: Some("GBR".to_string()),
                club: None,
                age: None,
                status: ResultStatus::Finished,
                time_behind: None,
                distance_name: Some("10K".to_string()),
                checkpoints: vec![ScrapedCheckpoint {
                    name: "5km".to_string(),
                    kind: CheckpointKind::Distance,
                    order: 1,
                    split_time: None,
                    cumulative_time: Some("17:10".to_string()),
                    pace: None,
                    segment_distance_meters: Some(5_000),
                }],
                fields_provided: vec!["position".to_string(), "name".to_string()],
            }],
            scrape_metadata: ScrapeMetadata {
                started_at: Utc::now(),
                completed_at: Utc::now(),
                total_pages: 1,
                total_results: 1,
                used_headless_browser: false,
                errors: vec![],
                warnings: vec![],
            },
        };

        let json = serde_json::to_string(&payload).unwrap();
        let back: ScrapedResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
