//! Scrape job lifecycle
//!
//! Jobs move pending -> running -> completed | failed. A failed job with a
//! scheduled `next_retry_at` sits in the retry queue; the drainer claims it
//! through a conditional update so two drainers can never take the same job.

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::ScrapeJob;
use crate::core::types::JobStatus;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Stored error messages are capped at 100 chars
pub const MAX_ERROR_LEN: usize = 100;

/// Truncate an error message for storage, respecting char boundaries
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

impl Database {
    /// Enqueue a new scrape job for an event URL
    pub async fn create_scrape_job(
        &self,
        organiser: &str,
        event_url: &str,
        max_retries: i64,
    ) -> DbResult<ScrapeJob> {
        let now = Utc::now();
        let job = ScrapeJob {
            id: Uuid::new_v4().to_string(),
            organiser: organiser.to_string(),
            event_url: event_url.to_string(),
            status: JobStatus::Pending,
            results_count: 0,
            error_message: None,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            notification_sent: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO scrape_jobs
                (id, organiser, event_url, status, results_count, error_message,
                 retry_count, max_retries, next_retry_at, notification_sent,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.organiser)
        .bind(&job.event_url)
        .bind(job.status)
        .bind(job.results_count)
        .bind(&job.error_message)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.next_retry_at)
        .bind(job.notification_sent)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "scrape_jobs"))?;

        Ok(job)
    }

    pub async fn get_scrape_job(&self, id: &str) -> DbResult<Option<ScrapeJob>> {
        let job = sqlx::query_as::<_, ScrapeJob>("SELECT * FROM scrape_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(job)
    }

    pub async fn mark_job_running(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE scrape_jobs SET status = 'running', updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn mark_job_completed(&self, id: &str, results_count: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = 'completed',
                results_count = ?,
                error_message = NULL,
                next_retry_at = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(results_count)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Mark a job failed with a truncated error and an optional next attempt.
    ///
    /// `next_retry_at = None` leaves the job permanently failed.
    pub async fn mark_job_failed(
        &self,
        id: &str,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = 'failed',
                error_message = ?,
                retry_count = retry_count + 1,
                next_retry_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(truncate_error(error))
        .bind(next_retry_at)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Claim a queued job for retry.
    ///
    /// The conditional update only succeeds while the job is still failed
    /// with a due `next_retry_at`; a second drainer observing the same job
    /// loses the race and gets `false`.
    pub async fn claim_job_for_retry(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = 'running',
                next_retry_at = NULL,
                updated_at = ?
            WHERE id = ?
              AND status = 'failed'
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= ?
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Jobs due for retry at `now`, ordered by next attempt time
    pub async fn due_retry_jobs(&self, now: DateTime<Utc>) -> DbResult<Vec<ScrapeJob>> {
        let jobs = sqlx::query_as::<_, ScrapeJob>(
            r#"
            SELECT * FROM scrape_jobs
            WHERE status = 'failed'
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= ?
            ORDER BY next_retry_at
            "#,
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;
        Ok(jobs)
    }

    pub async fn mark_notification_sent(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE scrape_jobs SET notification_sent = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
