//! Hopasports Scraper
//!
//! Hopasports event pages embed their results loader as a component
//! attribute: a quoted call carrying the API base URL and a JSON array of
//! race descriptors. Each descriptor is fetched as
//! `base?race_id=...&pt=...` and its JSON rows map through the field alias
//! table. Payloads that come back as HTML instead of JSON fall through to
//! table parsing.

use super::fields::{extract_result_fields, find_result_array};
use super::table;
use super::{
    OrganiserScraper, ProfileResult, ProgressSender, ProgressStage, ProgressUpdate,
    ScrapeError, ScrapeOptions, ScrapeResult, ScrapedAthleteProfile, ScrapedCheckpoint,
    ScrapedDistance, ScrapedEvent, ScrapedResult, ScrapedResults, ScrapeMetadata,
    ScraperCapabilities, UrlAnalysis,
};
use crate::core::checkpoints::{
    checkpoint_kind, detect_race_type, distance_meters_from_name, expected_checkpoints,
    normalize_checkpoint_name, parse_time,
};
use crate::core::fetch::fetch_page;
use crate::core::types::ResultStatus;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const ORGANISER: &str = "hopasports";

/// One race advertised by the loader attribute
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RaceDescriptor {
    pub race_id: i64,
    pub pt: String,
    pub title: String,
}

/// Extracts `loadRaces('<base>', [<descriptors>])` out of the attribute value
static LOADER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*\w+\(\s*'([^']+)'\s*,\s*(\[.*\])\s*\)\s*$").expect("loader call regex")
});

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso date regex"));

/// Scraper for hopasports.com result pages
pub struct HopasportsScraper;

impl HopasportsScraper {
    pub fn new() -> Self {
        Self
    }

    /// Pull the loader attribute off the event page.
    ///
    /// Returns the API base URL and the descriptor list in page order. Also
    /// used by the endpoint monitor to find the first race's API URL.
    pub fn parse_loader(html: &str, url: &str) -> ScrapeResult<(String, Vec<RaceDescriptor>)> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("[data-results-loader]")
            .map_err(|e| ScrapeError::parse("HTML", url, e.to_string()))?;

        let attr = document
            .select(&selector)
            .find_map(|el| el.value().attr("data-results-loader"))
            .ok_or_else(|| {
                ScrapeError::parse("HTML", url, "results loader attribute not found")
            })?;

        let captures = LOADER_CALL.captures(attr).ok_or_else(|| {
            ScrapeError::parse("HTML", url, "loader attribute is not a quoted call")
        })?;

        let base = captures[1].to_string();
        let descriptors: Vec<RaceDescriptor> = serde_json::from_str(&captures[2])
            .map_err(|e| ScrapeError::parse("JSON", url, e.to_string()))?;

        if descriptors.is_empty() {
            return Err(ScrapeError::parse(
                "JSON",
                url,
                "loader attribute carries no race descriptors",
            ));
        }

        Ok((base, descriptors))
    }

    /// API URL for one race descriptor
    pub fn race_api_url(base: &str, descriptor: &RaceDescriptor) -> String {
        format!(
            "{}?race_id={}&pt={}",
            base,
            descriptor.race_id,
            urlencoding::encode(&descriptor.pt)
        )
    }

    fn event_name(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        for sel in ["h1", "title"] {
            if let Ok(selector) = Selector::parse(sel) {
                if let Some(el) = document.select(&selector).next() {
                    let text = el.text().collect::<String>().trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
        None
    }

    fn event_date(html: &str) -> Option<NaiveDate> {
        let cap = ISO_DATE.captures(html)?;
        NaiveDate::from_ymd_opt(
            cap[1].parse().ok()?,
            cap[2].parse().ok()?,
            cap[3].parse().ok()?,
        )
    }

    /// Map one JSON row into a result, harvesting checkpoint-shaped keys.
    ///
    /// Keys that normalise to a checkpoint token ("5km", "T1", "swim") and
    /// hold a parseable clock value become cumulative checkpoints in key
    /// order.
    fn json_row_to_result(row: &Value, distance_name: &str) -> Option<ScrapedResult> {
        let fields = extract_result_fields(row);
        let name = fields.name?;

        let mut checkpoints = Vec::new();
        if let Some(obj) = row.as_object() {
            let mut order = 1i64;
            for (key, value) in obj {
                let normalized = normalize_checkpoint_name(key);
                if !table::is_checkpoint_header(&normalized) {
                    continue;
                }
                let Some(clock) = value.as_str().filter(|s| parse_time(s).is_some()) else {
                    continue;
                };
                checkpoints.push(ScrapedCheckpoint {
                    name: normalized.clone(),
                    kind: checkpoint_kind(&normalized),
                    order,
                    split_time: None,
                    cumulative_time: Some(clock.to_string()),
                    pace: None,
                    segment_distance_meters: None,
                });
                order += 1;
            }
        }

        Some(ScrapedResult {
            position: fields.position,
            bib: fields.bib,
            name,
            gender: fields.gender,
            category: fields.category,
            finish_time: fields.finish_time,
            gun_time: fields.gun_time,
            chip_time: fields.chip_time,
            pace: fields.pace,
            gender_position: fields.gender_position,
            category_position: fields.category_position,
            country: fields.country,
            club: fields.club,
            age: fields.age,
            status: fields
                .status
                .as_deref()
                .map_or(ResultStatus::Finished, ResultStatus::from_str),
            time_behind: fields.time_behind,
            distance_name: Some(distance_name.to_string()),
            checkpoints,
            fields_provided: fields.provided,
        })
    }

    /// Parse one race payload: JSON rows preferred, HTML tables as fallback
    fn parse_race_payload(
        body: &str,
        api_url: &str,
        distance_name: &str,
        warnings: &mut Vec<String>,
    ) -> ScrapeResult<Vec<ScrapedResult>> {
        let trimmed = body.trim_start();

        if trimmed.starts_with('<') {
            // HTML payload: fall back to row parsing
            let Some((headers, rows)) = table::find_results_table(body) else {
                return Err(ScrapeError::parse(
                    "HTML",
                    api_url,
                    "fallback payload has no results table",
                ));
            };
            let map = table::build_column_map(&headers).ok_or_else(|| {
                ScrapeError::parse("HTML", api_url, "fallback table lacks bib/name columns")
            })?;
            let mut results = Vec::new();
            for cells in &rows {
                match table::row_to_result(cells, &map) {
                    Some(mut result) => {
                        result.distance_name = Some(distance_name.to_string());
                        results.push(result);
                    }
                    None => warnings.push(format!("{}: skipped row without name", api_url)),
                }
            }
            return Ok(results);
        }

        let payload: Value = serde_json::from_str(trimmed)
            .map_err(|e| ScrapeError::parse("JSON", api_url, e.to_string()))?;
        let rows = find_result_array(&payload).ok_or_else(|| {
            ScrapeError::parse("JSON", api_url, "no result array under known keys")
        })?;

        let mut results = Vec::new();
        for row in rows {
            match Self::json_row_to_result(row, distance_name) {
                Some(result) => results.push(result),
                None => warnings.push(format!("{}: skipped row without name", api_url)),
            }
        }
        Ok(results)
    }

    fn descriptor_to_distance(descriptor: &RaceDescriptor) -> ScrapedDistance {
        let race_type = detect_race_type(&descriptor.title);
        let meters = distance_meters_from_name(&descriptor.title).unwrap_or(0);
        ScrapedDistance {
            name: descriptor.title.clone(),
            distance_meters: meters,
            race_type,
            expected_checkpoints: if meters > 0 {
                expected_checkpoints(race_type, meters)
            } else {
                vec!["finish".to_string()]
            },
        }
    }
}

impl Default for HopasportsScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganiserScraper for HopasportsScraper {
    fn organiser(&self) -> &'static str {
        ORGANISER
    }

    fn matches_url(&self, url: &str) -> bool {
        url.contains("hopasports.")
    }

    fn capabilities(&self) -> ScraperCapabilities {
        let mut expected = HashMap::new();
        expected.insert(
            "Half Marathon".to_string(),
            vec!["5km".to_string(), "10km".to_string(), "15km".to_string(), "20km".to_string(), "finish".to_string()],
        );
        expected.insert("10K".to_string(), vec!["5km".to_string(), "finish".to_string()]);

        ScraperCapabilities {
            supports_headless: false,
            supports_pagination: false,
            supports_multiple_distances: true,
            supports_checkpoints: true,
            expected_checkpoints: expected,
        }
    }

    async fn analyze_url(&self, url: &str) -> ScrapeResult<UrlAnalysis> {
        if !self.matches_url(url) {
            return Ok(UrlAnalysis::invalid());
        }

        let page = fetch_page(url).await?;
        let html = page.text();

        let Ok((_, descriptors)) = Self::parse_loader(&html, url) else {
            return Ok(UrlAnalysis::invalid());
        };

        Ok(UrlAnalysis {
            valid: true,
            organiser: Some(ORGANISER.to_string()),
            event_name: Self::event_name(&html),
            event_date: Self::event_date(&html),
            estimated_distances: descriptors.len(),
            estimated_results: 0,
            requires_headless: false,
        })
    }

    #[tracing::instrument(skip(self, options, progress), fields(url = %url))]
    async fn scrape_event(
        &self,
        url: &str,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> ScrapeResult<ScrapedResults> {
        let started_at = Utc::now();
        progress.update(ProgressUpdate::stage(ProgressStage::Initializing));

        progress.update(ProgressUpdate::stage(ProgressStage::Connecting));
        let page = fetch_page(url).await?;
        let html = page.text();

        let (base, descriptors) = Self::parse_loader(&html, url)?;
        progress.update(ProgressUpdate::stage(ProgressStage::DetectingPages));

        let mut warnings = Vec::new();
        let errors = Vec::new();
        let mut results: Vec<ScrapedResult> = Vec::new();
        let mut distances = Vec::new();
        let total_races = descriptors.len();

        for (idx, descriptor) in descriptors.iter().enumerate() {
            if options.cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            distances.push(Self::descriptor_to_distance(descriptor));

            let api_url = Self::race_api_url(&base, descriptor);
            tracing::debug!(race = %descriptor.title, api_url, "Fetching race results");
            let race_page = fetch_page(&api_url).await?;

            let race_results = Self::parse_race_payload(
                &race_page.text(),
                &api_url,
                &descriptor.title,
                &mut warnings,
            )?;
            results.extend(race_results);

            progress.update(ProgressUpdate::scraping(results.len(), idx + 1, total_races));

            if idx + 1 < total_races {
                tokio::time::sleep(Duration::from_millis(options.politeness_delay_ms)).await;
            }
        }

        if results.is_empty() {
            return Err(ScrapeError::NoRows { url: url.to_string() });
        }

        progress.update(ProgressUpdate::stage(ProgressStage::Validating));

        let event = ScrapedEvent {
            url: url.to_string(),
            organiser: ORGANISER.to_string(),
            name: Self::event_name(&html).unwrap_or_else(|| "Unknown Event".to_string()),
            date: Self::event_date(&html).unwrap_or_else(|| Utc::now().date_naive()),
            location: None,
            distances,
        };

        let total_results = results.len();
        Ok(ScrapedResults {
            event,
            results,
            scrape_metadata: ScrapeMetadata {
                started_at,
                completed_at: Utc::now(),
                total_pages: total_races,
                total_results,
                used_headless_browser: false,
                errors,
                warnings,
            },
        })
    }

    /// Athlete history endpoints answer JSON pages of past results
    async fn scrape_athlete_profile(
        &self,
        url: &str,
    ) -> ScrapeResult<Option<ScrapedAthleteProfile>> {
        let first = fetch_page(url).await?;
        let payload: Value = serde_json::from_str(&first.text())
            .map_err(|e| ScrapeError::parse("JSON", url, e.to_string()))?;

        let name = payload
            .get("athlete")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if name.is_empty() {
            return Ok(None);
        }

        let total_pages = payload
            .get("total_pages")
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;

        let mut results = Vec::new();
        let mut page_payload = payload;
        let mut page_no = 1usize;

        loop {
            if let Some(rows) = find_result_array(&page_payload) {
                for row in rows {
                    let event_name = row
                        .get("event_name")
                        .or_else(|| row.get("event"))
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    if event_name.is_empty() {
                        continue;
                    }
                    results.push(ProfileResult {
                        event_name,
                        date: row
                            .get("date")
                            .and_then(Value::as_str)
                            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
                        distance_name: row
                            .get("distance")
                            .and_then(Value::as_str)
                            .map(String::from),
                        finish_time: row
                            .get("finish_time")
                            .or_else(|| row.get("time"))
                            .and_then(Value::as_str)
                            .map(String::from),
                        position: row.get("position").and_then(Value::as_i64),
                    });
                }
            }

            page_no += 1;
            if page_no > total_pages {
                break;
            }

            let next_url = format!("{}?page={}", url, page_no);
            let next = fetch_page(&next_url).await?;
            page_payload = serde_json::from_str(&next.text())
                .map_err(|e| ScrapeError::parse("JSON", &next_url, e.to_string()))?;
        }

        Ok(Some(ScrapedAthleteProfile {
            name,
            results,
            total_pages,
        }))
    }
}
