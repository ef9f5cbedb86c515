//! Notification Services
//!
//! Fire-and-forget plain-text callouts to an external webhook. Prefixes are
//! stable because downstream routing keys off them; transport failures are
//! logged and never propagate into job or monitor state.

use crate::core::db::ScrapeJob;
use crate::core::fetch::get_client;
use std::time::Duration;

/// Notification timeout; the notifier must never hold a job hostage
const NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Webhook notifier
#[derive(Debug, Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { webhook_url }
    }

    /// A notifier that drops everything (tests, notifications disabled)
    pub fn disabled() -> Self {
        Self { webhook_url: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// POST a payload to the webhook. Errors are logged only.
    pub async fn send(&self, text: &str) {
        let Some(url) = &self.webhook_url else {
            tracing::debug!(payload = text, "Notifier disabled, dropping payload");
            return;
        };

        let result = get_client()
            .post(url)
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .header("content-type", "text/plain; charset=utf-8")
            .body(text.to_string())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(payload = text, "Notification delivered");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Notifier webhook rejected payload");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification send failed");
            }
        }
    }

    pub async fn scrape_complete(&self, job: &ScrapeJob, results_count: i64) {
        self.send(&format!(
            "SCRAPE COMPLETE [{}] {} results={}",
            job.short_id(),
            job.event_url,
            results_count
        ))
        .await;
    }

    pub async fn scrape_failed(&self, job: &ScrapeJob, error: &str, retry_count: i64) {
        self.send(&format!(
            "SCRAPE FAILED [{}] {} attempt={} error={}",
            job.short_id(),
            job.event_url,
            retry_count,
            error
        ))
        .await;
    }

    pub async fn scrape_retry_success(&self, job: &ScrapeJob, results_count: i64) {
        self.send(&format!(
            "SCRAPE RETRY SUCCESS [{}] {} results={}",
            job.short_id(),
            job.event_url,
            results_count
        ))
        .await;
    }

    pub async fn scrape_permanently_failed(&self, job: &ScrapeJob, retry_count: i64) {
        self.send(&format!(
            "SCRAPE PERMANENTLY FAILED [{}] {} attempts={}",
            job.short_id(),
            job.event_url,
            retry_count
        ))
        .await;
    }

    pub async fn endpoint_went_up(&self, name: &str, url: &str) {
        self.send(&format!("ENDPOINT UP {} {}", name, url)).await;
    }

    pub async fn endpoint_went_down(&self, name: &str, url: &str, failures: i64) {
        self.send(&format!("ENDPOINT DOWN {} {} consecutive_failures={}", name, url, failures))
            .await;
    }
}
