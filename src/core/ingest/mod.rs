//! Ingestion Coordinator
//!
//! Drives one scrape job end to end: pick the scraper, run it, persist the
//! envelope (event, distances, results, checkpoints, sources), settle the
//! job row and fire notifications. Every persistence step is idempotent by
//! URL / dedup hash, so re-running a job never duplicates data.

pub mod retry;

use crate::core::checkpoints::parse_time;
use crate::core::checkpoints::validation::first_non_monotonic;
use crate::core::db::{
    result_dedup_hash, Database, DbError, Event, EventDistance, RaceResult, ResultSource,
    ScrapeJob, TimingCheckpoint,
};
use crate::core::notify::Notifier;
use crate::core::scrapers::{
    select_scraper, OrganiserScraper, ProgressSender, ProgressStage, ProgressUpdate,
    ScrapeError, ScrapeOptions, ScrapedResult, ScrapedResults,
};
use crate::core::types::normalize_name;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Default retry budget for new jobs
pub const DEFAULT_MAX_RETRIES: i64 = 3;

/// Failure of one ingestion attempt
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl IngestError {
    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Scrape(ScrapeError::Cancelled))
    }

    /// Scrape retryability is the scraper's call; persistence failures are
    /// treated as transient (locks, disk) except unique violations, which
    /// never surface as errors here.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Scrape(e) => e.is_retryable(),
            Self::Db(_) => true,
        }
    }
}

/// Orchestrates scrape jobs over a shared scraper registry
pub struct IngestionCoordinator {
    db: Database,
    scrapers: Arc<Vec<Box<dyn OrganiserScraper>>>,
    notifier: Arc<Notifier>,
}

impl IngestionCoordinator {
    pub fn new(
        db: Database,
        scrapers: Vec<Box<dyn OrganiserScraper>>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            db,
            scrapers: Arc::new(scrapers),
            notifier,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Enqueue a scrape job for an event URL
    pub async fn enqueue(&self, organiser: &str, event_url: &str) -> Result<ScrapeJob, DbError> {
        let job = self
            .db
            .create_scrape_job(organiser, event_url, DEFAULT_MAX_RETRIES)
            .await?;
        tracing::info!(job_id = %job.id, url = event_url, "Scrape job enqueued");
        Ok(job)
    }

    /// Run a pending job to completion (or failure)
    #[tracing::instrument(skip(self, options, progress), fields(job_id = %job_id))]
    pub async fn run_pending_job(
        &self,
        job_id: &str,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> Result<(), DbError> {
        let Some(job) = self.db.get_scrape_job(job_id).await? else {
            tracing::warn!(job_id, "Job vanished before execution");
            return Ok(());
        };

        self.db.mark_job_running(&job.id).await?;
        self.execute_and_finalize(job, options, progress).await
    }

    /// Run a job the retry drainer has already claimed (status = running)
    pub async fn run_claimed_job(
        &self,
        job: ScrapeJob,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> Result<(), DbError> {
        self.execute_and_finalize(job, options, progress).await
    }

    async fn execute_and_finalize(
        &self,
        job: ScrapeJob,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> Result<(), DbError> {
        match self.ingest(&job, options, progress).await {
            Ok(results_count) => {
                self.db.mark_job_completed(&job.id, results_count).await?;
                progress
                    .finish(ProgressUpdate::stage(ProgressStage::Complete))
                    .await;

                // Retry successes get their own prefix so operators can see
                // the queue recovered on its own
                if job.retry_count > 0 {
                    self.notifier.scrape_retry_success(&job, results_count).await;
                } else {
                    self.notifier.scrape_complete(&job, results_count).await;
                }
                self.db.mark_notification_sent(&job.id).await?;

                tracing::info!(job_id = %job.id, results_count, "Scrape job completed");
                Ok(())
            }
            Err(e) => self.handle_failure(job, e, progress).await,
        }
    }

    async fn handle_failure(
        &self,
        job: ScrapeJob,
        error: IngestError,
        progress: &ProgressSender,
    ) -> Result<(), DbError> {
        progress
            .finish(ProgressUpdate::stage(ProgressStage::Error))
            .await;

        if error.is_cancelled() {
            // Cancelled jobs fail quietly and never requeue
            self.db.mark_job_failed(&job.id, "cancelled", None).await?;
            tracing::info!(job_id = %job.id, "Scrape job cancelled");
            return Ok(());
        }

        let message = error.to_string();
        let next_retry_at = if error.is_retryable() {
            retry::next_retry_at(Utc::now(), job.retry_count, job.max_retries)
        } else {
            None
        };

        self.db
            .mark_job_failed(&job.id, &message, next_retry_at)
            .await?;

        let attempts = job.retry_count + 1;
        if next_retry_at.is_some() {
            tracing::warn!(
                job_id = %job.id,
                attempts,
                next_retry_at = ?next_retry_at,
                error = %message,
                "Scrape job failed, retry scheduled"
            );
            if job.retry_count == 0 {
                self.notifier.scrape_failed(&job, &message, attempts).await;
                self.db.mark_notification_sent(&job.id).await?;
            }
        } else {
            tracing::error!(job_id = %job.id, attempts, error = %message, "Scrape job permanently failed");
            self.notifier.scrape_permanently_failed(&job, attempts).await;
            self.db.mark_notification_sent(&job.id).await?;
        }

        Ok(())
    }

    /// Scrape the job's URL and persist the whole envelope.
    ///
    /// Returns the number of scraped results.
    async fn ingest(
        &self,
        job: &ScrapeJob,
        options: &ScrapeOptions,
        progress: &ProgressSender,
    ) -> Result<i64, IngestError> {
        let hint = if job.organiser.is_empty() {
            None
        } else {
            Some(job.organiser.as_str())
        };
        let scraper = select_scraper(&self.scrapers, &job.event_url, hint)?;

        let payload = scraper
            .scrape_event(&job.event_url, options, progress)
            .await?;

        let report = scraper.validate_results(&payload);
        for warning in &report.warnings {
            tracing::debug!(job_id = %job.id, warning, "Validation warning");
        }
        if !report.errors.is_empty() {
            tracing::warn!(
                job_id = %job.id,
                errors = report.errors.len(),
                "Validation errors in scraped payload"
            );
        }
        let confidence = report.completeness_score.round().clamp(0.0, 100.0) as i64;

        progress.update(ProgressUpdate::stage(ProgressStage::Saving));
        let count = self.persist(&payload, confidence).await?;

        Ok(count)
    }

    /// Persist one scraped envelope. Every step is idempotent.
    async fn persist(&self, payload: &ScrapedResults, confidence: i64) -> Result<i64, DbError> {
        let now = Utc::now();

        let event = Event {
            id: Uuid::new_v4().to_string(),
            url: payload.event.url.clone(),
            organiser: payload.event.organiser.clone(),
            name: payload.event.name.clone(),
            event_date: payload.event.date,
            location: payload.event.location.clone(),
            metadata: None,
            scraped_at: None,
            created_at: now,
        };
        let event_id = self.db.insert_event(&event).await?;

        // Distances keep their declared order; ids come back canonical
        let mut distance_ids: HashMap<String, String> = HashMap::new();
        for scraped in &payload.event.distances {
            let distance = EventDistance {
                id: Uuid::new_v4().to_string(),
                event_id: event_id.clone(),
                distance_name: scraped.name.clone(),
                distance_meters: i64::from(scraped.distance_meters.max(1)),
                race_type: scraped.race_type,
                expected_checkpoints: serde_json::to_string(&scraped.expected_checkpoints).ok(),
                participant_count: None,
                created_at: now,
            };
            let id = self.db.insert_event_distance(&distance).await?;
            distance_ids.insert(scraped.name.clone(), id);
        }

        // Results in provider order, batched
        let rows: Vec<RaceResult> = payload
            .results
            .iter()
            .map(|scraped| to_race_result(&event_id, &distance_ids, scraped))
            .collect();
        let persisted = self.db.insert_results_batch(&rows).await?;

        // Checkpoints and provenance hang off the canonical result ids
        for (scraped, persisted_row) in payload.results.iter().zip(&persisted) {
            if !scraped.checkpoints.is_empty() {
                let checkpoints: Vec<TimingCheckpoint> = scraped
                    .checkpoints
                    .iter()
                    .map(|cp| TimingCheckpoint {
                        id: Uuid::new_v4().to_string(),
                        result_id: persisted_row.result_id.clone(),
                        checkpoint_kind: cp.kind,
                        checkpoint_name: cp.name.clone(),
                        checkpoint_order: cp.order,
                        split_time: cp.split_time.clone(),
                        cumulative_time: cp.cumulative_time.clone(),
                        pace: cp.pace.clone(),
                        segment_distance_meters: cp.segment_distance_meters,
                    })
                    .collect();
                self.db.insert_checkpoints(&checkpoints).await?;
            }

            let source = ResultSource {
                id: Uuid::new_v4().to_string(),
                result_id: persisted_row.result_id.clone(),
                organiser: payload.event.organiser.clone(),
                source_url: payload.event.url.clone(),
                scraped_at: payload.scrape_metadata.completed_at,
                fields_provided: serde_json::to_string(&fields_provided_of(scraped))
                    .unwrap_or_else(|_| "[]".to_string()),
                confidence,
                is_primary: false,
            };
            self.db.insert_result_source(&source).await?;
        }

        self.db.mark_event_scraped(&event_id).await?;

        Ok(payload.results.len() as i64)
    }
}

/// Logical field names populated on a scraped result
fn fields_provided_of(result: &ScrapedResult) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if result.position.is_some() {
        fields.push("position");
    }
    if result.bib.is_some() {
        fields.push("bib");
    }
    if !result.name.trim().is_empty() {
        fields.push("name");
    }
    if result.gender.is_some() {
        fields.push("gender");
    }
    if result.category.is_some() {
        fields.push("category");
    }
    if result.finish_time.is_some() {
        fields.push("finish_time");
    }
    if result.gun_time.is_some() {
        fields.push("gun_time");
    }
    if result.chip_time.is_some() {
        fields.push("chip_time");
    }
    if result.pace.is_some() {
        fields.push("pace");
    }
    if result.gender_position.is_some() {
        fields.push("gender_position");
    }
    if result.category_position.is_some() {
        fields.push("category_position");
    }
    if result.country.is_some() {
        fields.push("country");
    }
    if result.club.is_some() {
        fields.push("club");
    }
    if result.age.is_some() {
        fields.push("age");
    }
    if result.time_behind.is_some() {
        fields.push("time_behind");
    }
    if !result.checkpoints.is_empty() {
        fields.push("checkpoints");
    }
    fields
}

/// Convert one scraped row into its persistent form
fn to_race_result(
    event_id: &str,
    distance_ids: &HashMap<String, String>,
    scraped: &ScrapedResult,
) -> RaceResult {
    let normalized = normalize_name(&scraped.name);

    // A decreasing cumulative split is preserved on the row for review
    let cumulative: Vec<Option<u32>> = scraped
        .checkpoints
        .iter()
        .map(|cp| cp.cumulative_time.as_deref().and_then(parse_time))
        .collect();
    let validation = first_non_monotonic(&cumulative).map(|idx| {
        serde_json::json!({
            "warnings": [format!(
                "checkpoint '{}' has a decreasing cumulative time",
                scraped.checkpoints[idx].name
            )]
        })
        .to_string()
    });

    RaceResult {
        id: Uuid::new_v4().to_string(),
        event_id: event_id.to_string(),
        event_distance_id: scraped
            .distance_name
            .as_ref()
            .and_then(|name| distance_ids.get(name))
            .cloned(),
        athlete_id: None,
        dedup_hash: result_dedup_hash(
            event_id,
            scraped.position,
            scraped.bib.as_deref(),
            &normalized,
        ),
        overall_position: scraped.position,
        bib: scraped.bib.clone(),
        display_name: scraped.name.clone(),
        normalized_name: normalized,
        gender: scraped.gender.clone(),
        category: scraped.category.clone(),
        finish_time: scraped.finish_time.clone(),
        gun_time: scraped.gun_time.clone(),
        chip_time: scraped.chip_time.clone(),
        pace: scraped.pace.clone(),
        gender_position: scraped.gender_position,
        category_position: scraped.category_position,
        country: scraped.country.clone(),
        club: scraped.club.clone(),
        age: scraped.age,
        status: scraped.status,
        time_behind: scraped.time_behind.clone(),
        validation,
        metadata: None,
        created_at: Utc::now(),
    }
}
