//! Browser Manager
//!
//! Owns the long-lived headless browser. Pages are handed out through a
//! semaphore so at most three render concurrently; the permit travels inside
//! the page guard and releases on drop, whichever path the caller takes.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use super::page::RenderedPage;

/// Global cap on concurrently open pages
pub const MAX_CONCURRENT_PAGES: usize = 3;

/// Rotating User-Agent pool for rendered sessions
const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

/// Viewport pool paired with the User-Agents
const VIEWPORT_POOL: &[(u32, u32)] = &[(1280, 900), (1366, 768), (1920, 1080)];

/// Manager for the shared headless browser
pub struct BrowserManager {
    browser: Arc<Mutex<Option<Browser>>>,
    pages: Arc<Semaphore>,
    launch_counter: AtomicUsize,
}

impl BrowserManager {
    /// Create a new browser manager (browser not yet launched)
    pub fn new() -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            pages: Arc::new(Semaphore::new(MAX_CONCURRENT_PAGES)),
            launch_counter: AtomicUsize::new(0),
        }
    }

    /// Launch the headless browser, rotating User-Agent and viewport
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn launch(&self) -> Result<()> {
        let mut browser_guard = self.browser.lock().await;

        if browser_guard.is_some() {
            tracing::debug!("Browser already launched, skipping");
            return Ok(());
        }

        let rotation = self.launch_counter.fetch_add(1, Ordering::Relaxed);
        let user_agent = USER_AGENT_POOL[rotation % USER_AGENT_POOL.len()];
        let (width, height) = VIEWPORT_POOL[rotation % VIEWPORT_POOL.len()];

        let config = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", user_agent))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser. Is Chrome/Chromium installed?")?;

        // Drive CDP events until the browser goes away
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler event error");
                }
            }
            tracing::debug!("Browser handler task terminated");
        });

        tracing::info!(user_agent, width, height, "Headless browser launched");
        *browser_guard = Some(browser);

        Ok(())
    }

    /// Acquire a page slot and open `url` in a fresh page.
    ///
    /// Waits while three pages are already open. The returned guard holds
    /// the slot until dropped.
    #[tracing::instrument(skip(self), fields(url = %url), level = "debug")]
    pub async fn acquire_page(&self, url: &str) -> Result<RenderedPage> {
        let permit = self
            .pages
            .clone()
            .acquire_owned()
            .await
            .context("Page semaphore closed")?;

        let browser_guard = self.browser.lock().await;
        let browser = browser_guard
            .as_ref()
            .context("Browser not launched. Call launch() first.")?;

        let page = browser
            .new_page(url)
            .await
            .context("Failed to create new page")?;

        page.wait_for_navigation()
            .await
            .context("Failed to wait for navigation")?;

        tracing::debug!(available_slots = self.pages.available_permits(), "Page acquired");
        Ok(RenderedPage::new(page, permit))
    }

    /// Close the browser. Safe to call repeatedly and with pages in flight.
    pub async fn shutdown(&self) -> Result<()> {
        let mut browser_guard = self.browser.lock().await;

        if let Some(browser) = browser_guard.take() {
            if let Ok(pages) = browser.pages().await {
                for page in pages {
                    let _ = page.close().await;
                }
            }
            tracing::info!("Headless browser closed");
        }

        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Tie browser shutdown to process termination.
///
/// Spawns a task waiting on ctrl-c; shutdown stays idempotent so an explicit
/// shutdown elsewhere is fine.
pub fn install_shutdown_handler(manager: Arc<BrowserManager>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Termination signal received, closing browser");
            if let Err(e) = manager.shutdown().await {
                tracing::warn!(error = %e, "Browser shutdown on signal failed");
            }
        }
    });
}
