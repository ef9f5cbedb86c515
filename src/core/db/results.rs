//! Race result persistence
//!
//! Results insert in batches and deduplicate through a SHA-256 hash over
//! (event, position, bib, normalised name), so re-ingesting the same event is
//! additive rather than duplicating rows.

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::RaceResult;
use sha2::{Digest, Sha256};

/// Transport-friendly batch size for result inserts
pub const RESULT_BATCH_SIZE: usize = 500;

/// Dedup key for a result within its event
pub fn result_dedup_hash(
    event_id: &str,
    position: Option<i64>,
    bib: Option<&str>,
    normalized_name: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_id.as_bytes());
    hasher.update(position.map(|p| p.to_string()).unwrap_or_default().as_bytes());
    hasher.update(bib.unwrap_or_default().as_bytes());
    hasher.update(normalized_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of persisting one result row
#[derive(Debug, Clone)]
pub struct PersistedResult {
    /// Canonical id: the fresh row's id, or the surviving duplicate's
    pub result_id: String,
    pub inserted: bool,
}

impl Database {
    /// Insert results in provider row order, batched in transactions of
    /// [`RESULT_BATCH_SIZE`]. Duplicate rows (same event + dedup hash) are
    /// swallowed and resolved to the existing row's id.
    pub async fn insert_results_batch(
        &self,
        results: &[RaceResult],
    ) -> DbResult<Vec<PersistedResult>> {
        let mut persisted = Vec::with_capacity(results.len());

        for chunk in results.chunks(RESULT_BATCH_SIZE) {
            let mut tx = self.pool().begin().await?;

            for result in chunk {
                let res = sqlx::query(
                    r#"
                    INSERT INTO race_results (
                        id, event_id, event_distance_id, athlete_id, dedup_hash,
                        overall_position, bib, display_name, normalized_name,
                        gender, category, finish_time, gun_time, chip_time, pace,
                        gender_position, category_position, country, club, age,
                        status, time_behind, validation, metadata, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(event_id, dedup_hash) DO NOTHING
                    "#,
                )
                .bind(&result.id)
                .bind(&result.event_id)
                .bind(&result.event_distance_id)
                .bind(&result.athlete_id)
                .bind(&result.dedup_hash)
                .bind(result.overall_position)
                .bind(&result.bib)
                .bind(&result.display_name)
                .bind(&result.normalized_name)
                .bind(&result.gender)
                .bind(&result.category)
                .bind(&result.finish_time)
                .bind(&result.gun_time)
                .bind(&result.chip_time)
                .bind(&result.pace)
                .bind(result.gender_position)
                .bind(result.category_position)
                .bind(&result.country)
                .bind(&result.club)
                .bind(result.age)
                .bind(result.status)
                .bind(&result.time_behind)
                .bind(&result.validation)
                .bind(&result.metadata)
                .bind(result.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::classify(e, "race_results"))?;

                let inserted = res.rows_affected() > 0;
                let result_id: String = if inserted {
                    result.id.clone()
                } else {
                    sqlx::query_scalar(
                        "SELECT id FROM race_results WHERE event_id = ? AND dedup_hash = ?",
                    )
                    .bind(&result.event_id)
                    .bind(&result.dedup_hash)
                    .fetch_one(&mut *tx)
                    .await?
                };

                persisted.push(PersistedResult { result_id, inserted });
            }

            tx.commit().await?;
        }

        let inserted = persisted.iter().filter(|p| p.inserted).count();
        tracing::debug!(
            total = results.len(),
            inserted,
            skipped = results.len() - inserted,
            "Persisted result batch"
        );

        Ok(persisted)
    }

    pub async fn get_result_by_id(&self, id: &str) -> DbResult<Option<RaceResult>> {
        let result = sqlx::query_as::<_, RaceResult>("SELECT * FROM race_results WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(result)
    }

    /// Results for an event in provider order (position, then insertion)
    pub async fn get_results_for_event(&self, event_id: &str) -> DbResult<Vec<RaceResult>> {
        let results = sqlx::query_as::<_, RaceResult>(
            r#"
            SELECT * FROM race_results
            WHERE event_id = ?
            ORDER BY overall_position IS NULL, overall_position, created_at
            "#,
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(results)
    }

    pub async fn count_results_for_event(&self, event_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM race_results WHERE event_id = ?")
                .bind(event_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    /// Results not yet linked to an athlete, oldest first
    pub async fn get_unlinked_results(&self, limit: i64) -> DbResult<Vec<RaceResult>> {
        let results = sqlx::query_as::<_, RaceResult>(
            r#"
            SELECT * FROM race_results
            WHERE athlete_id IS NULL
            ORDER BY created_at
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(results)
    }

    pub async fn link_result_to_athlete(
        &self,
        result_id: &str,
        athlete_id: &str,
    ) -> DbResult<()> {
        sqlx::query("UPDATE race_results SET athlete_id = ? WHERE id = ?")
            .bind(athlete_id)
            .bind(result_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
