//! Domain enums stored as strings in SQLite
//!
//! Every enum-like column in the schema round-trips through these types.
//! Unknown strings fall back to a safe default rather than failing the row.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Race Types
// ============================================================================

/// Discipline of an event distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RaceType {
    Running,
    Triathlon,
    Duathlon,
    Ultra,
    Relay,
}

impl RaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Triathlon => "triathlon",
            Self::Duathlon => "duathlon",
            Self::Ultra => "ultra",
            Self::Relay => "relay",
        }
    }

    /// Parse from a stored column value; unknown strings become `Running`
    pub fn from_str(s: &str) -> Self {
        match s {
            "triathlon" => Self::Triathlon,
            "duathlon" => Self::Duathlon,
            "ultra" => Self::Ultra,
            "relay" => Self::Relay,
            _ => Self::Running,
        }
    }

    pub fn is_multisport(&self) -> bool {
        matches!(self, Self::Triathlon | Self::Duathlon)
    }
}

impl fmt::Display for RaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Result Status
// ============================================================================

/// Finish status of a single race result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ResultStatus {
    Finished,
    Dnf,
    Dns,
    Dq,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Dnf => "dnf",
            Self::Dns => "dns",
            Self::Dq => "dq",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "dnf" => Self::Dnf,
            "dns" => Self::Dns,
            "dq" => Self::Dq,
            _ => Self::Finished,
        }
    }

    pub fn finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl Default for ResultStatus {
    fn default() -> Self {
        Self::Finished
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Checkpoint Kind
// ============================================================================

/// What a timing checkpoint marks along the course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// A distance marker ("5km", "13mi")
    Distance,
    /// A transition zone ("T1", "T2")
    Transition,
    /// A discipline boundary ("swim", "bike", "run")
    Discipline,
}

impl CheckpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Transition => "transition",
            Self::Discipline => "discipline",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "transition" => Self::Transition,
            "discipline" => Self::Discipline,
            _ => Self::Distance,
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Scrape Job Status
// ============================================================================

/// Lifecycle state of a scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Endpoint Status
// ============================================================================

/// Status token of a monitored endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EndpointStatus {
    Up,
    Down,
    Unknown,
}

impl EndpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "up" => Self::Up,
            "down" => Self::Down,
            _ => Self::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

impl Default for EndpointStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Event Source Link Relation
// ============================================================================

/// Relation asserted between two events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SourceRelation {
    SameEvent,
    Related,
    Series,
}

impl SourceRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameEvent => "same_event",
            Self::Related => "related",
            Self::Series => "series",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "same_event" => Self::SameEvent,
            "series" => Self::Series,
            _ => Self::Related,
        }
    }
}

impl fmt::Display for SourceRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
