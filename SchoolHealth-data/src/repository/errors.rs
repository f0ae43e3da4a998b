use thiserror::Error;

use crate::database::DatabaseError;

/// Failures surfaced by the repositories; constraint violations arrive as `Conflict`
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("sqlite: {0}")]
    Sqlite(rusqlite::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// JSON column could not be encoded or decoded
    #[error("json column: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                RepositoryError::Conflict(
                    message.clone().unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => RepositoryError::Sqlite(error),
        }
    }
}
