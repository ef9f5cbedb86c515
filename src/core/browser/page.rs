//! Rendered page operations
//!
//! Wraps a CDP page with the operations scrapers need: selector-gated
//! navigation, pagination discovery, table extraction, bounded
//! scroll-to-load and static resource blocking.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::SetBlockedUrLsParams;
use chromiumoxide::Page;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{sleep, timeout};

/// Navigation and selector wait ceiling
pub const NAVIGATION_TIMEOUT_SECS: u64 = 60;

/// CSS candidates tried in order when discovering pagination controls
const PAGINATION_CANDIDATES: &[&str] = &[
    ".pagination a",
    ".pager a",
    "ul.page-numbers a",
    "nav[aria-label*='agination'] a",
    ".results-pagination a",
];

/// CSS candidates for the next-page control
const NEXT_PAGE_CANDIDATES: &[&str] = &[
    ".pagination a[rel='next']",
    "a[rel='next']",
    ".pagination .next a",
    ".pager-next a",
];

/// URL patterns blocked when static resources are disabled
const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg",
    "*.css", "*.woff", "*.woff2", "*.ttf", "*.otf",
    "*.mp4", "*.webm", "*.mp3",
];

/// Discovered pagination state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaginationInfo {
    pub total_pages: usize,
    pub next_selector: Option<String>,
}

/// A page slot checked out of the browser manager.
///
/// Dropping the guard releases the slot, so early returns and error paths
/// release too.
#[derive(Debug)]
pub struct RenderedPage {
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl RenderedPage {
    pub fn new(page: Page, permit: OwnedSemaphorePermit) -> Self {
        Self {
            page,
            _permit: permit,
        }
    }

    /// Navigate and wait until `selector` appears, bounded by the navigation
    /// timeout. Returns false when the selector never showed.
    pub async fn navigate_and_wait(&self, url: &str, selector: &str) -> Result<bool> {
        self.page
            .goto(url)
            .await
            .context("Failed to navigate to URL")?;
        self.page
            .wait_for_navigation()
            .await
            .context("Failed to wait for navigation")?;

        self.wait_for_selector(selector, NAVIGATION_TIMEOUT_SECS * 1_000)
            .await
    }

    /// Poll for a selector until it appears or `timeout_ms` elapses
    pub async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let deadline = Duration::from_millis(timeout_ms);
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return true;
                }
                sleep(Duration::from_millis(250)).await;
            }
        };

        match timeout(deadline, poll).await {
            Ok(found) => Ok(found),
            Err(_) => Ok(false),
        }
    }

    /// Discover pagination: highest page number among the candidate link
    /// groups, plus a usable next-page selector if any.
    pub async fn wait_for_pagination(&self) -> Result<PaginationInfo> {
        for candidate in PAGINATION_CANDIDATES {
            let script = format!(
                r#"
                (() => {{
                    const links = document.querySelectorAll("{}");
                    let max = 0;
                    for (const link of links) {{
                        const fromText = parseInt(link.textContent.trim(), 10);
                        if (!isNaN(fromText) && fromText > max) max = fromText;
                        const match = (link.href || '').match(/[?&]page=(\d+)/);
                        if (match) {{
                            const fromHref = parseInt(match[1], 10);
                            if (fromHref > max) max = fromHref;
                        }}
                    }}
                    return max;
                }})()
                "#,
                candidate
            );

            let max_page: usize = self
                .page
                .evaluate(script.as_str())
                .await
                .context("Pagination probe script failed")?
                .into_value()
                .unwrap_or(0);

            if max_page > 1 {
                let mut next_selector = None;
                for next in NEXT_PAGE_CANDIDATES {
                    if self.page.find_element(*next).await.is_ok() {
                        next_selector = Some((*next).to_string());
                        break;
                    }
                }

                tracing::debug!(candidate, max_page, "Pagination detected");
                return Ok(PaginationInfo {
                    total_pages: max_page,
                    next_selector,
                });
            }
        }

        Ok(PaginationInfo {
            total_pages: 1,
            next_selector: None,
        })
    }

    /// Header labels of the first table matching `table_selector`
    pub async fn extract_table_headers(&self, table_selector: &str) -> Result<Vec<String>> {
        let script = format!(
            r#"
            (() => {{
                const table = document.querySelector("{}");
                if (!table) return [];
                return Array.from(table.querySelectorAll("thead th, tr:first-child th"))
                    .map(th => th.textContent.trim());
            }})()
            "#,
            table_selector
        );

        let headers: Vec<String> = self
            .page
            .evaluate(script.as_str())
            .await
            .context("Header extraction script failed")?
            .into_value()
            .unwrap_or_default();
        Ok(headers)
    }

    /// Body rows of the first table matching `table_selector`, cell texts
    pub async fn extract_table_rows(&self, table_selector: &str) -> Result<Vec<Vec<String>>> {
        let script = format!(
            r#"
            (() => {{
                const table = document.querySelector("{}");
                if (!table) return [];
                const rows = table.querySelectorAll("tbody tr");
                return Array.from(rows).map(row =>
                    Array.from(row.querySelectorAll("td")).map(td => td.textContent.trim())
                ).filter(cells => cells.length > 0);
            }})()
            "#,
            table_selector
        );

        let rows: Vec<Vec<String>> = self
            .page
            .evaluate(script.as_str())
            .await
            .context("Row extraction script failed")?
            .into_value()
            .unwrap_or_default();
        Ok(rows)
    }

    /// Click the next-page control and wait for new rows
    pub async fn next_page(&self, next_selector: &str) -> Result<bool> {
        match self.page.find_element(next_selector).await {
            Ok(element) => {
                element.click().await.context("Failed to click next page")?;
                sleep(Duration::from_millis(750)).await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Scroll to the bottom repeatedly until the document height stabilises,
    /// bounded by `max_iterations`.
    pub async fn scroll_to_load(&self, max_iterations: usize) -> Result<usize> {
        let mut last_height: i64 = -1;
        let mut iterations = 0;

        for _ in 0..max_iterations {
            let height: i64 = self
                .page
                .evaluate(
                    "(() => { window.scrollTo(0, document.body.scrollHeight); return document.body.scrollHeight; })()",
                )
                .await
                .context("Scroll script failed")?
                .into_value()
                .unwrap_or(0);

            iterations += 1;
            if height == last_height {
                break;
            }
            last_height = height;
            sleep(Duration::from_millis(500)).await;
        }

        tracing::debug!(iterations, "Scroll-to-load finished");
        Ok(iterations)
    }

    /// Block images, styles, fonts and media to cut render latency
    pub async fn block_static_resources(&self) -> Result<()> {
        let params = SetBlockedUrLsParams::builder()
            .urls(
                BLOCKED_RESOURCE_PATTERNS
                    .iter()
                    .map(|p| (*p).to_string())
                    .collect::<Vec<_>>(),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build blocked URL params: {}", e))?;

        self.page
            .execute(params)
            .await
            .context("Failed to set blocked URL patterns")?;
        Ok(())
    }

    /// Full serialised HTML of the current document
    pub async fn html(&self) -> Result<String> {
        self.page.content().await.context("Failed to get page content")
    }
}
