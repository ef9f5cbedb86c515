//! Per-athlete performance summaries
//!
//! Trend material for athlete pages: race count, best time per distance,
//! the event carrying the fastest finish and a recent finish-time average.

use crate::core::checkpoints::{format_time, parse_time};
use crate::core::db::{Database, DbResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Results counted into the recent average
const RECENT_WINDOW: usize = 5;

#[derive(Debug, FromRow)]
struct PerformanceRow {
    finish_time: Option<String>,
    event_id: String,
    distance_name: Option<String>,
    event_date: NaiveDate,
}

/// Summary of an athlete's linked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthletePerformance {
    pub athlete_id: String,
    pub total_races: usize,
    /// Best finish (formatted) keyed by distance name
    pub best_times: HashMap<String, String>,
    /// Event (not result) carrying the overall fastest finish
    pub fastest_event_id: Option<String>,
    /// Mean finish seconds over the most recent races with parseable times
    pub recent_average_seconds: Option<u32>,
}

/// Compute the performance summary for one athlete
pub async fn athlete_performance(
    db: &Database,
    athlete_id: &str,
) -> DbResult<AthletePerformance> {
    let rows = sqlx::query_as::<_, PerformanceRow>(
        r#"
        SELECT rr.finish_time, rr.event_id, ed.distance_name, e.event_date
        FROM race_results rr
        JOIN events e ON e.id = rr.event_id
        LEFT JOIN event_distances ed ON ed.id = rr.event_distance_id
        WHERE rr.athlete_id = ?
        ORDER BY e.event_date DESC
        "#,
    )
    .bind(athlete_id)
    .fetch_all(db.pool())
    .await?;

    let total_races = rows.len();

    let mut best_seconds: HashMap<String, u32> = HashMap::new();
    let mut fastest: Option<(u32, String)> = None;
    let mut recent: Vec<u32> = Vec::new();

    for row in &rows {
        let Some(seconds) = row.finish_time.as_deref().and_then(parse_time) else {
            continue;
        };

        if let Some(distance) = &row.distance_name {
            let entry = best_seconds.entry(distance.clone()).or_insert(seconds);
            if seconds < *entry {
                *entry = seconds;
            }
        }

        // The join resolves the fastest finish to its event, not the raw
        // result row
        match &fastest {
            Some((best, _)) if *best <= seconds => {}
            _ => fastest = Some((seconds, row.event_id.clone())),
        }

        if recent.len() < RECENT_WINDOW {
            recent.push(seconds);
        }
    }

    let recent_average_seconds = if recent.is_empty() {
        None
    } else {
        Some((recent.iter().map(|s| u64::from(*s)).sum::<u64>() / recent.len() as u64) as u32)
    };

    Ok(AthletePerformance {
        athlete_id: athlete_id.to_string(),
        total_races,
        best_times: best_seconds
            .into_iter()
            .map(|(name, seconds)| (name, format_time(seconds)))
            .collect(),
        fastest_event_id: fastest.map(|(_, event_id)| event_id),
        recent_average_seconds,
    })
}
