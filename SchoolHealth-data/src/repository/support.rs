//! Small helpers shared by the SQLite repositories

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::RepositoryError;

/// Decode a JSON text column
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Encode a value for a JSON text column
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    Ok(serde_json::to_string(value)?)
}

/// Turn `QueryReturnedNoRows` into `Ok(None)`
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, RepositoryError> {
    Ok(result.optional()?)
}

/// Fail with `NotFound` when an update or delete touched no rows
pub(crate) fn expect_affected(affected: usize, what: &str, id: &str) -> Result<(), RepositoryError> {
    if affected == 0 {
        Err(RepositoryError::NotFound(format!("{} {}", what, id)))
    } else {
        Ok(())
    }
}
