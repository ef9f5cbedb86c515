//! Timing checkpoint persistence

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::TimingCheckpoint;

impl Database {
    /// Insert checkpoints for a result, preserving their declared order.
    ///
    /// A checkpoint name already present on the result is left untouched.
    /// Returns the number of rows actually inserted.
    pub async fn insert_checkpoints(
        &self,
        checkpoints: &[TimingCheckpoint],
    ) -> DbResult<usize> {
        if checkpoints.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        let mut inserted = 0usize;

        for cp in checkpoints {
            let res = sqlx::query(
                r#"
                INSERT INTO timing_checkpoints (
                    id, result_id, checkpoint_kind, checkpoint_name, checkpoint_order,
                    split_time, cumulative_time, pace, segment_distance_meters
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(result_id, checkpoint_name) DO NOTHING
                "#,
            )
            .bind(&cp.id)
            .bind(&cp.result_id)
            .bind(cp.checkpoint_kind)
            .bind(&cp.checkpoint_name)
            .bind(cp.checkpoint_order)
            .bind(&cp.split_time)
            .bind(&cp.cumulative_time)
            .bind(&cp.pace)
            .bind(cp.segment_distance_meters)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::classify(e, "timing_checkpoints"))?;

            inserted += res.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Checkpoints for a result, ordered along the course
    pub async fn get_checkpoints_for_result(
        &self,
        result_id: &str,
    ) -> DbResult<Vec<TimingCheckpoint>> {
        let checkpoints = sqlx::query_as::<_, TimingCheckpoint>(
            r#"
            SELECT * FROM timing_checkpoints
            WHERE result_id = ?
            ORDER BY checkpoint_order
            "#,
        )
        .bind(result_id)
        .fetch_all(self.pool())
        .await?;
        Ok(checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::results::result_dedup_hash;
    use crate::core::db::types::{Event, RaceResult};
    use crate::core::types::{CheckpointKind, ResultStatus};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    async fn db_with_result() -> (Database, String) {
        let db = Database::connect_memory().await.unwrap();
        db.migrate().await.unwrap();

        let event = Event {
            id: Uuid::new_v4().to_string(),
            url: "https://results.example.com/e/2".to_string(),
            organiser: "hopasports".to_string(),
            name: "Lakeside Tri".to_string(),
            event_date: NaiveDate::from_ymd_opt(2026, 6, 7).unwrap(),
            location: None,
            metadata: None,
            scraped_at: None,
            created_at: Utc::now(),
        };
        let event_id = db.insert_event(&event).await.unwrap();

        let result = RaceResult {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.clone(),
            event_distance_id: None,
            athlete_id: None,
            dedup_hash: result_dedup_hash(&event_id, Some(1), None, "jane doe"),
            overall_position: Some(1),
            bib: None,
            display_name: "Jane Doe".to_string(),
            normalized_name: "jane doe".to_string(),
            gender: None,
            category: None,
            finish_time: Some("2:20:11".to_string()),
            gun_time: None,
            chip_time: None,
            pace: None,
            gender_position: None,
            category_position: None,
            country: None,
            club: None,
            age: None,
            status: ResultStatus::Finished,
            time_behind: None,
            validation: None,
            metadata: None,
            created_at: Utc::now(),
        };
        let persisted = db.insert_results_batch(&[result]).await.unwrap();
        (db, persisted[0].result_id.clone())
    }

    fn checkpoint(result_id: &str, name: &str, order: i64, cumulative: &str) -> TimingCheckpoint {
        TimingCheckpoint {
            id: Uuid::new_v4().to_string(),
            result_id: result_id.to_string(),
            checkpoint_kind: CheckpointKind::Discipline,
            checkpoint_name: name.to_string(),
            checkpoint_order: order,
            split_time: None,
            cumulative_time: Some(cumulative.to_string()),
            pace: None,
            segment_distance_meters: None,
        }
    }

    #[tokio::test]
    async fn test_checkpoints_ordered_and_unique_by_name() {
        let (db, result_id) = db_with_result().await;

        let cps = vec![
            checkpoint(&result_id, "swim", 1, "28:00"),
            checkpoint(&result_id, "T1", 2, "30:10"),
            checkpoint(&result_id, "bike", 3, "1:40:00"),
            // duplicate name, different order: must be ignored
            checkpoint(&result_id, "swim", 9, "99:99"),
        ];

        let inserted = db.insert_checkpoints(&cps).await.unwrap();
        assert_eq!(inserted, 3);

        let fetched = db.get_checkpoints_for_result(&result_id).await.unwrap();
        let names: Vec<&str> = fetched.iter().map(|c| c.checkpoint_name.as_str()).collect();
        assert_eq!(names, vec!["swim", "T1", "bike"]);
        assert_eq!(fetched[0].cumulative_time.as_deref(), Some("28:00"));
    }

    #[tokio::test]
    async fn test_empty_checkpoint_batch() {
        let (db, _) = db_with_result().await;
        assert_eq!(db.insert_checkpoints(&[]).await.unwrap(), 0);
    }
}
