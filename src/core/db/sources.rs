//! Result provenance persistence
//!
//! Each scrape leaves a ResultSource row per result recording which fields
//! that pass provided. The first source for a result becomes primary; later
//! sources join as secondary until promoted.

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::ResultSource;

impl Database {
    /// Append a provenance row for a result.
    ///
    /// The insert is made primary iff the result has no primary source yet;
    /// the check and insert run in one transaction so concurrent scrapes
    /// cannot create two primaries.
    pub async fn insert_result_source(&self, source: &ResultSource) -> DbResult<String> {
        let mut tx = self.pool().begin().await?;

        let has_primary: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM result_sources WHERE result_id = ? AND is_primary = 1",
        )
        .bind(&source.result_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_primary = has_primary == 0;

        sqlx::query(
            r#"
            INSERT INTO result_sources
                (id, result_id, organiser, source_url, scraped_at,
                 fields_provided, confidence, is_primary)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.id)
        .bind(&source.result_id)
        .bind(&source.organiser)
        .bind(&source.source_url)
        .bind(source.scraped_at)
        .bind(&source.fields_provided)
        .bind(source.confidence.clamp(0, 100))
        .bind(is_primary)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::classify(e, "result_sources"))?;

        tx.commit().await?;
        Ok(source.id.clone())
    }

    pub async fn get_sources_for_result(&self, result_id: &str) -> DbResult<Vec<ResultSource>> {
        let sources = sqlx::query_as::<_, ResultSource>(
            "SELECT * FROM result_sources WHERE result_id = ? ORDER BY scraped_at",
        )
        .bind(result_id)
        .fetch_all(self.pool())
        .await?;
        Ok(sources)
    }

    /// Promote one source to primary, demoting any other
    pub async fn set_primary_source(&self, result_id: &str, source_id: &str) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("UPDATE result_sources SET is_primary = 0 WHERE result_id = ?")
            .bind(result_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE result_sources SET is_primary = 1 WHERE id = ? AND result_id = ?")
            .bind(source_id)
            .bind(result_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
