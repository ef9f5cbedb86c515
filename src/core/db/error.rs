//! Persistence error classification
//!
//! Unique-constraint violations are part of normal operation (idempotent
//! re-ingestion) and are distinguished from real persistence failures.

use thiserror::Error;

/// Error type for persistence operations
#[derive(Error, Debug)]
pub enum DbError {
    /// A unique constraint rejected the row. Callers performing idempotent
    /// inserts treat this as success.
    #[error("Unique constraint violation on {table}")]
    UniqueViolation { table: String },

    /// Any other database failure
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Classify an sqlx error, tagging unique violations with the table name
    pub fn classify(err: sqlx::Error, table: &str) -> Self {
        if is_unique_violation(&err) {
            Self::UniqueViolation {
                table: table.to_string(),
            }
        } else {
            Self::Sqlx(err)
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// SQLite reports unique violations as error code 2067 (or 1555 for primary
/// keys); sqlx surfaces both through `is_unique_violation`.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Result type alias for persistence operations
pub type DbResult<T> = Result<T, DbError>;

/// Run an insert, swallowing a unique violation as `Ok(false)`.
///
/// Returns `Ok(true)` when the row was actually inserted.
pub fn swallow_unique(result: Result<(), DbError>) -> DbResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e),
    }
}
