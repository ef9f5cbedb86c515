//! Shared domain types
//!
//! String-backed enums for every enum-like column plus the canonical name
//! normalisation used across matching and deduplication.

pub mod enums;
pub mod normalize;

pub use enums::{
    CheckpointKind, EndpointStatus, JobStatus, RaceType, ResultStatus, SourceRelation,
};
pub use normalize::normalize_name;
