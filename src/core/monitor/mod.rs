//! Endpoint Monitor
//!
//! Liveness probing of organiser result endpoints. A probe GETs the page,
//! follows an embedded results-loader to the first race's API when present,
//! and persists the observation; up/down edges go to the notifier.
//!
//! Status tokens: {unknown, up, down}, starting at unknown. Edges are only
//! emitted when the token changes away from a previously known token.

use crate::core::db::{Database, DbResult, MonitoredEndpoint, ProbeRecord, ProbeTransition};
use crate::core::fetch::{fetch_with_timeout, FetchError};
use crate::core::notify::Notifier;
use crate::core::scrapers::hopasports::HopasportsScraper;
use crate::core::types::EndpointStatus;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Probe timeout; tighter than scraper fetches
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// Bodies shorter than this don't count as real results
const MIN_RESULT_BODY_LEN: usize = 100;

/// Whether an API body looks like it actually carries results.
///
/// Any JSON object qualifies; otherwise the body must be longer than the
/// floor and free of the literal `error`.
pub fn body_indicates_results(body: &str) -> bool {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return true;
        }
    }
    trimmed.len() > MIN_RESULT_BODY_LEN && !trimmed.contains("error")
}

/// Monitor over all enabled endpoints
pub struct EndpointMonitor {
    db: Database,
    notifier: Arc<Notifier>,
}

impl EndpointMonitor {
    pub fn new(db: Database, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Probe one endpoint without persisting anything
    pub async fn probe(&self, endpoint: &MonitoredEndpoint) -> ProbeRecord {
        let started = Instant::now();
        let timeout = Duration::from_secs(PROBE_TIMEOUT_SECS);

        let page = match fetch_with_timeout(&endpoint.url, timeout).await {
            Ok(page) => page,
            Err(e) => {
                let http_status = match &e {
                    FetchError::HttpStatus { status, .. } => Some(i64::from(*status)),
                    FetchError::Transport { .. } => None,
                };
                return ProbeRecord {
                    status: EndpointStatus::Down,
                    http_status,
                    response_time_ms: Some(started.elapsed().as_millis() as i64),
                    has_results: false,
                    error_message: Some(e.to_string()),
                };
            }
        };

        let html = page.text();
        let response_time_ms = Some(started.elapsed().as_millis() as i64);

        // An embedded results loader means the page advertises API-backed
        // results; follow the first race to see whether they answer
        match HopasportsScraper::parse_loader(&html, &endpoint.url) {
            Ok((base, descriptors)) => {
                let first = &descriptors[0];
                let api_url = HopasportsScraper::race_api_url(&base, first);

                match fetch_with_timeout(&api_url, timeout).await {
                    Ok(api_page) => {
                        let has_results = body_indicates_results(&api_page.text());
                        ProbeRecord {
                            status: if has_results {
                                EndpointStatus::Up
                            } else {
                                EndpointStatus::Down
                            },
                            http_status: Some(i64::from(api_page.status)),
                            response_time_ms,
                            has_results,
                            error_message: if has_results {
                                None
                            } else {
                                Some("results API answered without results".to_string())
                            },
                        }
                    }
                    Err(e) => ProbeRecord {
                        status: EndpointStatus::Down,
                        http_status: e.status().map(i64::from),
                        response_time_ms,
                        has_results: false,
                        error_message: Some(format!("results API: {}", e)),
                    },
                }
            }
            // No loader: a reachable page is up, it just carries no results
            Err(_) => ProbeRecord {
                status: EndpointStatus::Up,
                http_status: Some(i64::from(page.status)),
                response_time_ms,
                has_results: false,
                error_message: None,
            },
        }
    }

    /// Probe one endpoint, persist the observation and emit edges
    #[tracing::instrument(skip(self, endpoint), fields(endpoint = %endpoint.name))]
    pub async fn check_endpoint(
        &self,
        endpoint: &MonitoredEndpoint,
    ) -> DbResult<ProbeTransition> {
        let record = self.probe(endpoint).await;
        tracing::debug!(
            status = %record.status,
            http_status = ?record.http_status,
            has_results = record.has_results,
            "Probe finished"
        );

        let transition = self.db.record_probe(&endpoint.id, &record, Utc::now()).await?;

        // Edges only fire on changes between known tokens
        if transition.changed && transition.previous != EndpointStatus::Unknown {
            match transition.current {
                EndpointStatus::Up => {
                    tracing::info!(url = %endpoint.url, "Endpoint went up");
                    self.notifier.endpoint_went_up(&endpoint.name, &endpoint.url).await;
                }
                EndpointStatus::Down => {
                    let failures = self
                        .db
                        .get_endpoint_status(&endpoint.id)
                        .await?
                        .map_or(1, |s| s.consecutive_failures);
                    tracing::warn!(url = %endpoint.url, failures, "Endpoint went down");
                    self.notifier
                        .endpoint_went_down(&endpoint.name, &endpoint.url, failures)
                        .await;
                }
                EndpointStatus::Unknown => {}
            }
        }

        Ok(transition)
    }

    /// Check every enabled endpoint whose interval has elapsed
    #[tracing::instrument(skip(self))]
    pub async fn run_monitor_pass(&self) -> DbResult<usize> {
        let due = self.db.endpoints_due(Utc::now()).await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::info!(count = due.len(), "Running monitor pass");
        let mut checked = 0usize;

        for endpoint in &due {
            if let Err(e) = self.check_endpoint(endpoint).await {
                tracing::error!(endpoint = %endpoint.name, error = %e, "Endpoint check failed");
                continue;
            }
            checked += 1;
        }

        Ok(checked)
    }
}
