//! Event and event-distance persistence
//!
//! Events are identified by URL; inserts are idempotent so that re-running a
//! scrape of the same URL reuses the existing row.

use super::connection::Database;
use super::error::{DbError, DbResult};
use super::types::{Event, EventDistance, EventSourceLink};
use crate::core::types::SourceRelation;
use chrono::Utc;
use uuid::Uuid;

impl Database {
    /// Insert an event, returning the canonical id for its URL.
    ///
    /// If an event already exists for the URL the existing id is returned and
    /// the row is left untouched.
    pub async fn insert_event(&self, event: &Event) -> DbResult<String> {
        let res = sqlx::query(
            r#"
            INSERT INTO events (id, url, organiser, name, event_date, location, metadata, scraped_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&event.id)
        .bind(&event.url)
        .bind(&event.organiser)
        .bind(&event.name)
        .bind(event.event_date)
        .bind(&event.location)
        .bind(&event.metadata)
        .bind(event.scraped_at)
        .bind(event.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "events"))?;

        if res.rows_affected() == 0 {
            tracing::debug!(url = %event.url, "Event already exists, reusing");
        }

        let id: String = sqlx::query_scalar("SELECT id FROM events WHERE url = ?")
            .bind(&event.url)
            .fetch_one(self.pool())
            .await?;
        Ok(id)
    }

    pub async fn get_event_by_url(&self, url: &str) -> DbResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE url = ?")
            .bind(url)
            .fetch_optional(self.pool())
            .await?;
        Ok(event)
    }

    pub async fn get_event_by_id(&self, id: &str) -> DbResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(event)
    }

    /// Metadata is the only mutable column after creation
    pub async fn update_event_metadata(&self, event_id: &str, metadata: &str) -> DbResult<()> {
        sqlx::query("UPDATE events SET metadata = ? WHERE id = ?")
            .bind(metadata)
            .bind(event_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Stamp the event with the completion time of its latest scrape
    pub async fn mark_event_scraped(&self, event_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE events SET scraped_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(event_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Delete an event; distances, results, checkpoints and sources cascade
    pub async fn delete_event(&self, event_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Insert a distance, returning the canonical id for (event, name)
    pub async fn insert_event_distance(&self, distance: &EventDistance) -> DbResult<String> {
        sqlx::query(
            r#"
            INSERT INTO event_distances
                (id, event_id, distance_name, distance_meters, race_type,
                 expected_checkpoints, participant_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id, distance_name) DO NOTHING
            "#,
        )
        .bind(&distance.id)
        .bind(&distance.event_id)
        .bind(&distance.distance_name)
        .bind(distance.distance_meters)
        .bind(distance.race_type)
        .bind(&distance.expected_checkpoints)
        .bind(distance.participant_count)
        .bind(distance.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "event_distances"))?;

        let id: String = sqlx::query_scalar(
            "SELECT id FROM event_distances WHERE event_id = ? AND distance_name = ?",
        )
        .bind(&distance.event_id)
        .bind(&distance.distance_name)
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    pub async fn get_distances_for_event(&self, event_id: &str) -> DbResult<Vec<EventDistance>> {
        let distances = sqlx::query_as::<_, EventDistance>(
            "SELECT * FROM event_distances WHERE event_id = ? ORDER BY created_at, distance_name",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(distances)
    }

    /// Assert that two events represent the same real-world event.
    ///
    /// The pair is stored undirected (lexicographically ordered) so the
    /// unique constraint catches both insertion orders. Self-links are
    /// rejected.
    pub async fn link_events(
        &self,
        event_a: &str,
        event_b: &str,
        relation: SourceRelation,
        confidence: i64,
    ) -> DbResult<bool> {
        if event_a == event_b {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "event_source_links cannot reference a single event".to_string(),
            )));
        }

        let (first, second) = if event_a < event_b {
            (event_a, event_b)
        } else {
            (event_b, event_a)
        };

        let res = sqlx::query(
            r#"
            INSERT INTO event_source_links (id, event_a, event_b, relation, confidence, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_a, event_b) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(first)
        .bind(second)
        .bind(relation)
        .bind(confidence.clamp(0, 100))
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| DbError::classify(e, "event_source_links"))?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn get_event_links(&self, event_id: &str) -> DbResult<Vec<EventSourceLink>> {
        let links = sqlx::query_as::<_, EventSourceLink>(
            "SELECT * FROM event_source_links WHERE event_a = ? OR event_b = ?",
        )
        .bind(event_id)
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(links)
    }
}
