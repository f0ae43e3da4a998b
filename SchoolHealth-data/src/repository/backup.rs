use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, json_column, optional, to_json};
use crate::database::DatabasePool;
use crate::models::BackupRecord;

/// Repository trait for backup metadata
#[async_trait]
pub trait BackupRepositoryTrait {
    async fn create(&self, backup: &BackupRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, backup_id: &str) -> Result<Option<BackupRecord>, RepositoryError>;
    /// Newest first
    async fn list(&self) -> Result<Vec<BackupRecord>, RepositoryError>;
    /// Overwrite every mutable column of a backup
    async fn update(&self, backup: &BackupRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, backup_id: &str) -> Result<(), RepositoryError>;
    /// Completed backups whose auto-delete time has passed
    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<BackupRecord>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct BackupRepository {
    pool: DatabasePool,
}

impl BackupRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT backup_id, name, backup_type, status, size, collections, created_by,
    file_path, checksum, start_time, end_time, duration_ms, error_message, auto_delete_at, is_verified,
    retention_days FROM backups";

fn map_row(row: &Row<'_>) -> rusqlite::Result<BackupRecord> {
    Ok(BackupRecord {
        backup_id: row.get(0)?,
        name: row.get(1)?,
        backup_type: row.get(2)?,
        status: row.get(3)?,
        size: row.get(4)?,
        collections: json_column(row, 5)?,
        created_by: row.get(6)?,
        file_path: row.get(7)?,
        checksum: row.get(8)?,
        start_time: row.get(9)?,
        end_time: row.get(10)?,
        duration_ms: row.get(11)?,
        error_message: row.get(12)?,
        auto_delete_at: row.get(13)?,
        is_verified: row.get(14)?,
        retention_days: row.get(15)?,
    })
}

#[async_trait]
impl BackupRepositoryTrait for BackupRepository {
    async fn create(&self, b: &BackupRecord) -> Result<(), RepositoryError> {
        debug!("Storing backup record: id={}, type={}", b.backup_id, b.backup_type);
        let collections = to_json(&b.collections)?;
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO backups (backup_id, name, backup_type, status, size, collections, created_by,
                file_path, checksum, start_time, end_time, duration_ms, error_message, auto_delete_at,
                is_verified, retention_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                b.backup_id, b.name, b.backup_type, b.status, b.size, collections, b.created_by,
                b.file_path, b.checksum, b.start_time, b.end_time, b.duration_ms, b.error_message,
                b.auto_delete_at, b.is_verified, b.retention_days,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, backup_id: &str) -> Result<Option<BackupRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE backup_id = ?1", SELECT_COLUMNS), [backup_id], map_row))
    }

    async fn list(&self) -> Result<Vec<BackupRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY start_time DESC", SELECT_COLUMNS))?;
        let backups = stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(backups)
    }

    async fn update(&self, b: &BackupRecord) -> Result<(), RepositoryError> {
        let collections = to_json(&b.collections)?;
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE backups SET status = ?2, size = ?3, collections = ?4, file_path = ?5, checksum = ?6,
                end_time = ?7, duration_ms = ?8, error_message = ?9, auto_delete_at = ?10, is_verified = ?11
             WHERE backup_id = ?1",
            params![
                b.backup_id, b.status, b.size, collections, b.file_path, b.checksum, b.end_time,
                b.duration_ms, b.error_message, b.auto_delete_at, b.is_verified,
            ],
        )?;
        expect_affected(affected, "backup", &b.backup_id)
    }

    async fn delete(&self, backup_id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute("DELETE FROM backups WHERE backup_id = ?1", [backup_id])?;
        expect_affected(affected, "backup", backup_id)
    }

    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<BackupRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = 'completed' AND auto_delete_at IS NOT NULL AND auto_delete_at <= ?1",
            SELECT_COLUMNS
        ))?;
        let backups = stmt.query_map([now], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(backups)
    }
}
