//! Database Layer (SQLite)
//!
//! Persistence adapter for all domain entities, using SQLx with async
//! support. Each entity family lives in its own file; everything hangs off
//! the shared [`Database`] handle.

mod athletes;
mod checkpoints;
mod connection;
mod error;
mod events;
mod jobs;
mod monitor;
mod results;
mod sources;
mod types;

pub use connection::Database;
pub use error::{DbError, DbResult};
pub use jobs::{truncate_error, MAX_ERROR_LEN};
pub use monitor::{ProbeRecord, ProbeTransition};
pub use results::{result_dedup_hash, PersistedResult, RESULT_BATCH_SIZE};
pub use types::{
    Athlete, AthleteFollow, EndpointStatusCurrent, EndpointStatusHistory, Event, EventDistance,
    EventSourceLink, MonitoredEndpoint, RaceResult, ResultSource, ScrapeJob, TimingCheckpoint,
};
