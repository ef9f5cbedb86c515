//! EvoChip Scraper
//!
//! EvoChip publishes plain HTML result tables paginated through `page=N`
//! links. Some of their newer event pages render the table client-side and
//! cap static output at 100 rows per page; when the first page carries an
//! exact multiple of 100 rows but pagination claims a single page, the
//! scrape re-runs through the headless renderer.

use super::table::{self, ColumnMap};
use super::{
    OrganiserScraper, ProgressSender, ProgressStage, ProgressUpdate, ScrapeError,
    ScrapeOptions, ScrapeResult, ScrapedDistance, ScrapedEvent, ScrapedResult,
    ScrapedResults, ScrapeMetadata, ScraperCapabilities, UrlAnalysis,
};
use crate::core::browser::BrowserManager;
use crate::core::checkpoints::{
    detect_race_type, distance_meters_from_name, expected_checkpoints,
};
use crate::core::fetch::fetch_page;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const ORGANISER: &str = "evochip";

/// Static pages cap out at this many rows; a full page with no visible
/// pagination is the tell for a JS-rendered table
const STATIC_PAGE_ROW_LIMIT: usize = 100;

/// Upper bound on scroll iterations in headless mode
const MAX_SCROLL_ITERATIONS: usize = 30;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso date regex"));

/// Scraper for evochip.net result tables
pub struct EvoChipScraper {
    browser: Option<Arc<BrowserManager>>,
}

impl EvoChipScraper {
    pub fn new() -> Self {
        Self { browser: None }
    }

    /// Attach the shared headless browser for the JS-rendered fallback
    pub fn with_browser(mut self, browser: Arc<BrowserManager>) -> Self {
        self.browser = Some(browser);
        self
    }

    fn page_url(url: &str, page: usize) -> String {
        if url.contains('?') {
            format!("{}&page={}", url, page)
        } else {
            format!("{}?page={}", url, page)
        }
    }

    fn event_name(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        for sel in ["h1", "h2.event-title", "title"] {
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

    /// The static table looks truncated when it fills the page row limit
    /// exactly while pagination claims a single page
    fn looks_truncated(first_page_rows: usize, total_pages: usize) -> bool {
        first_page_rows > 0
            && first_page_rows % STATIC_PAGE_ROW_LIMIT == 0
            && total_pages == 1
    }

    fn parse_page(
        html: &str,
        url: &str,
        map: Option<&ColumnMap>,
        warnings: &mut Vec<String>,
    ) -> ScrapeResult<(ColumnMap, Vec<ScrapedResult>)> {
        let (headers, rows) = table::find_results_table(html).ok_or_else(|| {
            ScrapeError::parse("HTML", url, "no results table with bib and name headings")
        })?;

        let map = match map {
            Some(existing) => existing.clone(),
            None => table::build_column_map(&headers).ok_or_else(|| {
                ScrapeError::parse("HTML", url, "results table lacks bib/name columns")
            })?,
        };

        let mut results = Vec::new();
        for cells in &rows {
            match table::row_to_result(cells, &map) {
                Some(result) => results.push(result),
                None => warnings.push(format!("{}: skipped row without name", url)),
            }
        }

        Ok((map, results))
    }

    /// Re-run the scrape through the headless renderer.
    ///
    /// Navigates, waits for the table, discovers the real pagination from the
    /// rendered DOM and walks every page.
    async fn scrape_with_browser(
        &self,
        url: &str,
        options: &ScrapeOptions,
        progress: &ProgressSender,
        warnings: &mut Vec<String>,
    ) -> ScrapeResult<(Vec<ScrapedResult>, usize)> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::browser(url, "no browser attached"))?;

        browser
            .launch()
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;

        let page = browser
            .acquire_page(url)
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;

        page.block_static_resources()
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;

        if !page
            .wait_for_selector("table", 30_000)
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?
        {
            return Err(ScrapeError::browser(url, "results table never rendered"));
        }

        page.scroll_to_load(MAX_SCROLL_ITERATIONS)
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;

        let pagination = page
            .wait_for_pagination()
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;
        let total_pages = options
            .max_pages
            .map_or(pagination.total_pages, |cap| pagination.total_pages.min(cap));

        let headers = page
            .extract_table_headers("table")
            .await
            .map_err(|e| ScrapeError::browser(url, e.to_string()))?;
        let map = table::build_column_map(&headers).ok_or_else(|| {
            ScrapeError::browser(url, "rendered table lacks bib/name columns")
        })?;

        let mut results = Vec::new();
        let mut current_page = 1usize;

        loop {
            if options.cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let rows = page
                .extract_table_rows("table")
                .await
                .map_err(|e| ScrapeError::browser(url, e.to_string()))?;
            for cells in &rows {
                match table::row_to_result(cells, &map) {
                    Some(result) => results.push(result),
                    None => warnings.push(format!("{} (rendered): skipped row without name", url)),
                }
            }

            progress.update(ProgressUpdate::scraping(results.len(), current_page, total_pages));

            if current_page >= total_pages {
                break;
            }
            let advanced = match &pagination.next_selector {
                Some(next) => page
                    .next_page(next)
                    .await
                    .map_err(|e| ScrapeError::browser(url, e.to_string()))?,
                None => {
                    page.navigate_and_wait(&Self::page_url(url, current_page + 1), "table")
                        .await
                        .map_err(|e| ScrapeError::browser(url, e.to_string()))?
                }
            };
            if !advanced {
                warnings.push(format!("{}: pagination stopped at page {}", url, current_page));
                break;
            }

            current_page += 1;
            tokio::time::sleep(Duration::from_millis(options.politeness_delay_ms)).await;
        }

        Ok((results, total_pages))
    }
}

impl Default for EvoChipScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrganiserScraper for EvoChipScraper {
    fn organiser(&self) -> &'static str {
        ORGANISER
    }

    fn matches_url(&self, url: &str) -> bool {
        url.contains("evochip.")
    }

    fn capabilities(&self) -> ScraperCapabilities {
        let mut expected = HashMap::new();
        expected.insert(
            "Half Marathon".to_string(),
            vec![
                "5km".to_string(),
                "10km".to_string(),
                "13km".to_string(),
                "15km".to_string(),
                "finish".to_string(),
            ],
        );

        ScraperCapabilities {
            supports_headless: true,
            supports_pagination: true,
            supports_multiple_distances: false,
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

        let Some((headers, rows)) = table::find_results_table(&html) else {
            return Ok(UrlAnalysis::invalid());
        };
        if table::build_column_map(&headers).is_none() {
            return Ok(UrlAnalysis::invalid());
        }

        let total_pages = table::discover_total_pages(&html);

        Ok(UrlAnalysis {
            valid: true,
            organiser: Some(ORGANISER.to_string()),
            event_name: Self::event_name(&html),
            event_date: Self::event_date(&html),
            estimated_distances: 1,
            estimated_results: rows.len() * total_pages,
            requires_headless: Self::looks_truncated(rows.len(), total_pages),
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
        let first = fetch_page(url).await?;
        let html = first.text();

        let mut warnings = Vec::new();
        let errors = Vec::new();
        let (map, mut results) = Self::parse_page(&html, url, None, &mut warnings)?;

        progress.update(ProgressUpdate::stage(ProgressStage::DetectingPages));
        let discovered_pages = table::discover_total_pages(&html);
        let first_page_rows = results.len();

        let mut used_headless = false;
        let mut total_pages = discovered_pages;

        if Self::looks_truncated(first_page_rows, discovered_pages)
            && options.allow_headless
            && self.browser.is_some()
        {
            tracing::info!(
                url,
                rows = first_page_rows,
                "Static page looks truncated, re-running through headless renderer"
            );
            match self
                .scrape_with_browser(url, options, progress, &mut warnings)
                .await
            {
                Ok((rendered, pages)) => {
                    results = rendered;
                    total_pages = pages;
                    used_headless = true;
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => {
                    // Prefer the static result over a dead browser
                    tracing::warn!(url, error = %e, "Headless fallback failed, keeping static rows");
                    warnings.push(format!("headless fallback failed: {}", e));
                }
            }
        } else {
            let page_cap = options.max_pages.map_or(total_pages, |cap| total_pages.min(cap));
            for page_no in 2..=page_cap {
                if options.cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }

                tokio::time::sleep(Duration::from_millis(options.politeness_delay_ms)).await;

                let page_url = Self::page_url(url, page_no);
                let fetched = fetch_page(&page_url).await?;
                let (_, page_results) =
                    Self::parse_page(&fetched.text(), &page_url, Some(&map), &mut warnings)?;
                results.extend(page_results);

                progress.update(ProgressUpdate::scraping(results.len(), page_no, page_cap));
            }
            total_pages = page_cap;
        }

        if results.is_empty() {
            return Err(ScrapeError::NoRows { url: url.to_string() });
        }

        progress.update(ProgressUpdate::stage(ProgressStage::Validating));

        let name = Self::event_name(&html).unwrap_or_else(|| "Unknown Event".to_string());
        let race_type = detect_race_type(&name);
        let meters = distance_meters_from_name(&name).unwrap_or(0);
        let distance = ScrapedDistance {
            name: name.clone(),
            distance_meters: meters,
            race_type,
            expected_checkpoints: if meters > 0 {
                expected_checkpoints(race_type, meters)
            } else {
                vec!["finish".to_string()]
            },
        };

        for result in &mut results {
            result.distance_name = Some(distance.name.clone());
        }

        let total_results = results.len();
        Ok(ScrapedResults {
            event: ScrapedEvent {
                url: url.to_string(),
                organiser: ORGANISER.to_string(),
                name,
                date: Self::event_date(&html).unwrap_or_else(|| Utc::now().date_naive()),
                location: None,
                distances: vec![distance],
            },
            results,
            scrape_metadata: ScrapeMetadata {
                started_at,
                completed_at: Utc::now(),
                total_pages,
                total_results,
                used_headless_browser: used_headless,
                errors,
                warnings,
            },
        })
    }
}
