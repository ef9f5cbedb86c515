//! Monitored endpoint persistence
//!
//! Probes append to the history log and upsert the current-status row.
//! `last_status_change` only advances when the status token actually differs
//! from the previously persisted one.

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::{EndpointStatusCurrent, EndpointStatusHistory, MonitoredEndpoint};
use crate::core::types::EndpointStatus;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// One probe's observation, ready to persist
#[derive(Debug, Clone)]
pub struct ProbeRecord {
    pub status: EndpointStatus,
    pub http_status: Option<i64>,
    pub response_time_ms: Option<i64>,
    pub has_results: bool,
    pub error_message: Option<String>,
}

/// The persisted state transition produced by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTransition {
    pub previous: EndpointStatus,
    pub current: EndpointStatus,
    pub changed: bool,
}

impl Database {
    /// Register an endpoint; the URL is unique so re-registration is a no-op
    pub async fn insert_monitored_endpoint(
        &self,
        endpoint: &MonitoredEndpoint,
    ) -> DbResult<String> {
        sqlx::query(
            r#"
            INSERT INTO monitored_endpoints
                (id, organiser, name, url, enabled, check_interval_minutes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&endpoint.id)
        .bind(&endpoint.organiser)
        .bind(&endpoint.name)
        .bind(&endpoint.url)
        .bind(endpoint.enabled)
        .bind(endpoint.check_interval_minutes)
        .bind(endpoint.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "monitored_endpoints"))?;

        let id: String = sqlx::query_scalar("SELECT id FROM monitored_endpoints WHERE url = ?")
            .bind(&endpoint.url)
            .fetch_one(self.pool())
            .await?;
        Ok(id)
    }

    pub async fn set_endpoint_enabled(&self, id: &str, enabled: bool) -> DbResult<()> {
        sqlx::query("UPDATE monitored_endpoints SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn list_enabled_endpoints(&self) -> DbResult<Vec<MonitoredEndpoint>> {
        let endpoints = sqlx::query_as::<_, MonitoredEndpoint>(
            "SELECT * FROM monitored_endpoints WHERE enabled = 1 ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(endpoints)
    }

    /// Enabled endpoints whose check interval has elapsed (or never checked)
    pub async fn endpoints_due(&self, now: DateTime<Utc>) -> DbResult<Vec<MonitoredEndpoint>> {
        let endpoints = self.list_enabled_endpoints().await?;
        let mut due = Vec::new();

        for endpoint in endpoints {
            let current = self.get_endpoint_status(&endpoint.id).await?;
            let is_due = match current {
                None => true,
                Some(c) => {
                    c.last_checked + Duration::minutes(endpoint.check_interval_minutes) <= now
                }
            };
            if is_due {
                due.push(endpoint);
            }
        }

        Ok(due)
    }

    pub async fn get_endpoint_status(
        &self,
        endpoint_id: &str,
    ) -> DbResult<Option<EndpointStatusCurrent>> {
        let status = sqlx::query_as::<_, EndpointStatusCurrent>(
            "SELECT * FROM endpoint_status_current WHERE endpoint_id = ?",
        )
        .bind(endpoint_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(status)
    }

    pub async fn get_endpoint_history(
        &self,
        endpoint_id: &str,
        limit: i64,
    ) -> DbResult<Vec<EndpointStatusHistory>> {
        let history = sqlx::query_as::<_, EndpointStatusHistory>(
            r#"
            SELECT * FROM endpoint_status_history
            WHERE endpoint_id = ?
            ORDER BY checked_at DESC
            LIMIT ?
            "#,
        )
        .bind(endpoint_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(history)
    }

    /// Persist one probe: append history, upsert current.
    ///
    /// Returns the transition so the caller can emit went-up / went-down
    /// edges. `last_status_change` carries the prior value unless the token
    /// changed; consecutive failures count up on down and reset on up.
    pub async fn record_probe(
        &self,
        endpoint_id: &str,
        record: &ProbeRecord,
        now: DateTime<Utc>,
    ) -> DbResult<ProbeTransition> {
        let mut tx = self.pool().begin().await?;

        let current = sqlx::query_as::<_, EndpointStatusCurrent>(
            "SELECT * FROM endpoint_status_current WHERE endpoint_id = ?",
        )
        .bind(endpoint_id)
        .fetch_optional(&mut *tx)
        .await?;

        let previous = current.as_ref().map_or(EndpointStatus::Unknown, |c| c.status);
        let changed = record.status != previous;

        let last_status_change = if changed {
            now
        } else {
            current.as_ref().map_or(now, |c| c.last_status_change)
        };

        let consecutive_failures = if record.status == EndpointStatus::Down {
            current.as_ref().map_or(0, |c| c.consecutive_failures) + 1
        } else {
            0
        };

        sqlx::query(
            r#"
            INSERT INTO endpoint_status_history
                (id, endpoint_id, status, http_status, response_time_ms,
                 has_results, error_message, checked_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(endpoint_id)
        .bind(record.status)
        .bind(record.http_status)
        .bind(record.response_time_ms)
        .bind(record.has_results)
        .bind(&record.error_message)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO endpoint_status_current
                (endpoint_id, status, http_status, response_time_ms, has_results,
                 last_checked, last_status_change, consecutive_failures)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(endpoint_id) DO UPDATE SET
                status = excluded.status,
                http_status = excluded.http_status,
                response_time_ms = excluded.response_time_ms,
                has_results = excluded.has_results,
                last_checked = excluded.last_checked,
                last_status_change = excluded.last_status_change,
                consecutive_failures = excluded.consecutive_failures
            "#,
        )
        .bind(endpoint_id)
        .bind(record.status)
        .bind(record.http_status)
        .bind(record.response_time_ms)
        .bind(record.has_results)
        .bind(now)
        .bind(last_status_change)
        .bind(consecutive_failures)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProbeTransition {
            previous,
            current: record.status,
            changed,
        })
    }
}
