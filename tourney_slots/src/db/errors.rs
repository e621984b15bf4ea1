//! Repository error types.

use std::time::Duration;
use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A uniqueness rule or concurrent transaction rejected the write
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Operation did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

/// SQLSTATE codes that signal a concurrent write rather than a broken query
const CONFLICT_CODES: [&str; 3] = [
    "23505", // unique_violation
    "40001", // serialization_failure
    "40P01", // deadlock_detected
];

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if CONFLICT_CODES.contains(&code.as_ref()) {
                    return RepositoryError::Conflict(db_err.message().to_string());
                }
            }
        }
        RepositoryError::Database(err)
    }
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
