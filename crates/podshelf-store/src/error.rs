// ABOUTME: Error taxonomy for storage operations and the mapping from raw SQLite failures into it.
// ABOUTME: Busy means retry later, Unavailable means the file itself is unusable.

use podshelf_core::ValidationError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors returned by every [`StorageManager`](crate::StorageManager) operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    /// Writer contention exceeded the configured wait. Safe to retry.
    #[error("storage busy: {0}")]
    Busy(String),

    /// The database file could not be read or written. Not safe to retry blindly.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn closed() -> Self {
        Self::Unavailable("storage manager has been shut down".to_string())
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    Self::Busy(err.to_string())
                }
                ErrorCode::ConstraintViolation
                    if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Self::Conflict(err.to_string())
                }
                _ => Self::Unavailable(err.to_string()),
            },
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unavailable(format!("storage task failed: {err}"))
    }
}
