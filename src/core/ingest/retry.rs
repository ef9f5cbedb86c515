//! Retry Queue
//!
//! Failed scrape jobs requeue on an exponential wall-clock schedule. A
//! single drainer claims due jobs through a conditional update and re-runs
//! them sequentially, pausing between jobs so a burst of retries does not
//! hammer the organiser.

use super::IngestionCoordinator;
use crate::core::scrapers::{ProgressSender, ScrapeOptions};
use chrono::{DateTime, Duration, Utc};

/// Backoff schedule in wall-clock minutes, indexed by prior retry count
pub const BACKOFF_MINUTES: [i64; 3] = [5, 15, 45];

/// Pause between drained jobs
const DRAIN_PAUSE_SECS: u64 = 2;

/// The backoff interval before attempt `retry_count + 1`, or `None` once
/// the schedule is exhausted
pub fn backoff_interval(retry_count: i64) -> Option<Duration> {
    let idx = usize::try_from(retry_count).ok()?;
    BACKOFF_MINUTES.get(idx).map(|m| Duration::minutes(*m))
}

/// Next attempt time for a job that just failed, or `None` when the job is
/// out of retries
pub fn next_retry_at(
    now: DateTime<Utc>,
    retry_count: i64,
    max_retries: i64,
) -> Option<DateTime<Utc>> {
    if retry_count >= max_retries {
        return None;
    }
    backoff_interval(retry_count).map(|interval| now + interval)
}

/// Single-worker drainer over the retry queue
pub struct RetryDrainer<'a> {
    coordinator: &'a IngestionCoordinator,
    options: ScrapeOptions,
}

impl<'a> RetryDrainer<'a> {
    pub fn new(coordinator: &'a IngestionCoordinator, options: ScrapeOptions) -> Self {
        Self {
            coordinator,
            options,
        }
    }

    /// Claim and re-run every due job, in `next_retry_at` order.
    ///
    /// Returns the number of jobs actually executed. Jobs another drainer
    /// claimed first are skipped silently.
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self) -> anyhow::Result<usize> {
        let now = Utc::now();
        let due = self.coordinator.database().due_retry_jobs(now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::info!(count = due.len(), "Draining retry queue");
        let mut executed = 0usize;

        for job in due {
            if !self
                .coordinator
                .database()
                .claim_job_for_retry(&job.id, now)
                .await?
            {
                tracing::debug!(job_id = %job.id, "Job claimed elsewhere, skipping");
                continue;
            }

            tracing::info!(
                job_id = %job.id,
                url = %job.event_url,
                attempt = job.retry_count + 1,
                "Retrying scrape job"
            );

            self.coordinator
                .run_claimed_job(job, &self.options, &ProgressSender::noop())
                .await?;
            executed += 1;

            tokio::time::sleep(std::time::Duration::from_secs(DRAIN_PAUSE_SECS)).await;
        }

        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_interval(0), Some(Duration::minutes(5)));
        assert_eq!(backoff_interval(1), Some(Duration::minutes(15)));
        assert_eq!(backoff_interval(2), Some(Duration::minutes(45)));
        assert_eq!(backoff_interval(3), None);
        assert_eq!(backoff_interval(-1), None);
    }

    #[test]
    fn test_next_retry_at_respects_budget() {
        let now = Utc::now();

        let first = next_retry_at(now, 0, 3).unwrap();
        assert_eq!(first, now + Duration::minutes(5));

        let second = next_retry_at(now, 1, 3).unwrap();
        assert_eq!(second, now + Duration::minutes(15));

        let third = next_retry_at(now, 2, 3).unwrap();
        assert_eq!(third, now + Duration::minutes(45));

        assert_eq!(next_retry_at(now, 3, 3), None);
    }

    #[test]
    fn test_next_retry_at_lower_budget() {
        let now = Utc::now();
        assert!(next_retry_at(now, 0, 1).is_some());
        assert_eq!(next_retry_at(now, 1, 1), None);
    }

    #[test]
    fn test_next_retry_is_strictly_future() {
        let now = Utc::now();
        for retry_count in 0..3 {
            let at = next_retry_at(now, retry_count, 3).unwrap();
            assert!(at > now);
        }
    }
}
