//! Persistent entity types
//!
//! Row structs for every table in the schema. Enum-like columns decode into
//! the typed enums from `core::types`.

use crate::core::types::{
    CheckpointKind, EndpointStatus, JobStatus, RaceType, ResultStatus, SourceRelation,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A race event, unique by URL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub url: String,
    /// Organiser tag ("hopasports", "evochip")
    pub organiser: String,
    pub name: String,
    pub event_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free-form JSON blob; the only mutable column after creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A named distance within an event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventDistance {
    pub id: String,
    pub event_id: String,
    pub distance_name: String,
    pub distance_meters: i64,
    pub race_type: RaceType,
    /// JSON array of expected checkpoint names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_checkpoints: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One athlete's finish in one event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RaceResult {
    pub id: String,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_distance_id: Option<String>,
    /// Weak reference; deleting the athlete nulls this, never the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<String>,
    /// SHA-256 over event + position + bib + normalised name
    pub dedup_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bib: Option<String>,
    pub display_name: String,
    pub normalized_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Kept as the provider's string; parsed only when used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gun_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_behind: Option<String>,
    /// JSON validation payload from the scrape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A timing point attached to a race result, unique by name within the result
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimingCheckpoint {
    pub id: String,
    pub result_id: String,
    pub checkpoint_kind: CheckpointKind,
    pub checkpoint_name: String,
    /// 1-based position along the course
    pub checkpoint_order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_distance_meters: Option<i64>,
}

/// Provenance record naming the organiser and URL that contributed a result
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResultSource {
    pub id: String,
    pub result_id: String,
    pub organiser: String,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
    /// JSON array of field names the source populated
    pub fields_provided: String,
    /// 0-100
    pub confidence: i64,
    pub is_primary: bool,
}

/// Assertion that two events represent the same real-world event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventSourceLink {
    pub id: String,
    pub event_a: String,
    pub event_b: String,
    pub relation: SourceRelation,
    pub confidence: i64,
    pub created_at: DateTime<Utc>,
}

/// Athlete identity record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Athlete {
    pub id: String,
    pub display_name: String,
    pub normalized_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Directed follower relation between athletes
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AthleteFollow {
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle record for one ingestion attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScrapeJob {
    pub id: String,
    pub organiser: String,
    pub event_url: String,
    pub status: JobStatus,
    pub results_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub max_retries: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJob {
    /// First 8 chars of the UUID, used in notification payloads
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }

    /// A job is queued for retry while failed with a scheduled next attempt
    pub fn is_queued_for_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.next_retry_at.is_some()
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.status == JobStatus::Failed
            && self.next_retry_at.is_none()
            && self.retry_count >= self.max_retries
    }
}

/// A URL whose liveness is periodically probed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoredEndpoint {
    pub id: String,
    pub organiser: String,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub check_interval_minutes: i64,
    pub created_at: DateTime<Utc>,
}

/// Latest known status of a monitored endpoint
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EndpointStatusCurrent {
    pub endpoint_id: String,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    pub has_results: bool,
    pub last_checked: DateTime<Utc>,
    pub last_status_change: DateTime<Utc>,
    pub consecutive_failures: i64,
}

/// Append-only log row for a single probe
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EndpointStatusHistory {
    pub id: String,
    pub endpoint_id: String,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    pub has_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}
