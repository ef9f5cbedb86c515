//! Athlete identity persistence

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::{Athlete, AthleteFollow};
use chrono::Utc;

impl Database {
    pub async fn insert_athlete(&self, athlete: &Athlete) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO athletes
                (id, display_name, normalized_name, gender, birth_date,
                 country, external_user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&athlete.id)
        .bind(&athlete.display_name)
        .bind(&athlete.normalized_name)
        .bind(&athlete.gender)
        .bind(athlete.birth_date)
        .bind(&athlete.country)
        .bind(&athlete.external_user_id)
        .bind(athlete.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "athletes"))?;
        Ok(())
    }

    pub async fn get_athlete_by_id(&self, id: &str) -> DbResult<Option<Athlete>> {
        let athlete = sqlx::query_as::<_, Athlete>("SELECT * FROM athletes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(athlete)
    }

    /// Athletes whose normalised name contains the query substring.
    ///
    /// This is the shortlist feeding the fuzzy matcher; `limit` bounds the
    /// candidate pool.
    pub async fn search_athletes_by_normalized_name(
        &self,
        query: &str,
        limit: i64,
    ) -> DbResult<Vec<Athlete>> {
        // Escape LIKE wildcards so a literal % in a name cannot widen the scan
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let athletes = sqlx::query_as::<_, Athlete>(
            r#"
            SELECT * FROM athletes
            WHERE normalized_name LIKE ? ESCAPE '\'
            ORDER BY normalized_name
            LIMIT ?
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(athletes)
    }

    /// Delete an athlete. Results keep their rows; the link column nulls out.
    pub async fn delete_athlete(&self, id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM athletes WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record a follow; duplicate follows are swallowed, self-follows rejected
    pub async fn follow_athlete(&self, follower_id: &str, following_id: &str) -> DbResult<bool> {
        if follower_id == following_id {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "an athlete cannot follow themselves".to_string(),
            )));
        }

        let res = sqlx::query(
            r#"
            INSERT INTO athlete_follows (follower_id, following_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "athlete_follows"))?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn unfollow_athlete(&self, follower_id: &str, following_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM athlete_follows WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn get_following(&self, follower_id: &str) -> DbResult<Vec<AthleteFollow>> {
        let follows = sqlx::query_as::<_, AthleteFollow>(
            "SELECT * FROM athlete_follows WHERE follower_id = ? ORDER BY created_at",
        )
        .bind(follower_id)
        .fetch_all(self.pool())
        .await?;
        Ok(follows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_db() -> Database {
        let db = Database::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn athlete(name: &str, normalized: &str) -> Athlete {
        Athlete {
            id: Uuid::new_v4().to_string(),
            display_name: name.to_string(),
            normalized_name: normalized.to_string(),
            gender: None,
            birth_date: None,
            country: None,
            external_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_substring_search() {
        let db = test_db().await;
        db.insert_athlete(&athlete("Jose Garcia", "jose garcia"))
            .await
            .unwrap();
        db.insert_athlete(&athlete("Maria Garcia", "maria garcia"))
            .await
            .unwrap();
        db.insert_athlete(&athlete("Sam Hill", "sam hill")).await.unwrap();

        let hits = db
            .search_athletes_by_normalized_name("garcia", 50)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let limited = db
            .search_athletes_by_normalized_name("garcia", 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_unique_and_non_self() {
        let db = test_db().await;
        let a = athlete("A Runner", "a runner");
        let b = athlete("B Runner", "b runner");
        db.insert_athlete(&a).await.unwrap();
        db.insert_athlete(&b).await.unwrap();

        assert!(db.follow_athlete(&a.id, &b.id).await.unwrap());
        assert!(!db.follow_athlete(&a.id, &b.id).await.unwrap());
        assert!(db.follow_athlete(&a.id, &a.id).await.is_err());

        assert_eq!(db.get_following(&a.id).await.unwrap().len(), 1);
        db.unfollow_athlete(&a.id, &b.id).await.unwrap();
        assert!(db.get_following(&a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_athlete_nulls_result_link() {
        let db = test_db().await;

        let event = crate::core::db::types::Event {
            id: Uuid::new_v4().to_string(),
            url: "https://results.example.com/e/4".to_string(),
            organiser: "evochip".to_string(),
            name: "Spring 10K".to_string(),
            event_date: chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            location: None,
            metadata: None,
            scraped_at: None,
            created_at: Utc::now(),
        };
        let event_id = db.insert_event(&event).await.unwrap();

        let a = athlete("Jane Doe", "jane doe");
        db.insert_athlete(&a).await.unwrap();

        let mut result = crate::core::db::results::tests::sample_result(&event_id, 1, "Jane Doe");
        result.athlete_id = Some(a.id.clone());
        db.insert_results_batch(std::slice::from_ref(&result))
            .await
            .unwrap();

        db.delete_athlete(&a.id).await.unwrap();

        let reloaded = db.get_result_by_id(&result.id).await.unwrap().unwrap();
        assert!(reloaded.athlete_id.is_none());
    }
}
