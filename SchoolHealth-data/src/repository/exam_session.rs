use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::support::{expect_affected, json_column, optional, to_json};
use crate::database::DatabasePool;
use crate::models::{EditRequestRecord, ExamSessionRecord};

/// Repository trait for exam sessions
#[async_trait]
pub trait ExamSessionRepositoryTrait {
    async fn create(&self, session: &ExamSessionRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ExamSessionRecord>, RepositoryError>;
    /// Newest first by creation time
    async fn list(&self) -> Result<Vec<ExamSessionRecord>, RepositoryError>;
    /// Persist the lock columns of a session
    async fn update_lock(&self, session: &ExamSessionRecord) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// Repository trait for edit requests on locked sessions
#[async_trait]
pub trait EditRequestRepositoryTrait {
    async fn create(&self, request: &EditRequestRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<EditRequestRecord>, RepositoryError>;

    /// Requests newest first, optionally filtered by requester and status
    async fn list(
        &self,
        requested_by: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<EditRequestRecord>, RepositoryError>;

    /// Persist status and review columns
    async fn update(&self, request: &EditRequestRecord) -> Result<(), RepositoryError>;

    /// Whether the doctor has a pending request on the session
    async fn has_pending(&self, exam_session_id: &str, requested_by: &str) -> Result<bool, RepositoryError>;

    /// The doctor's approved request whose unlock is still running at `now`
    async fn find_active_unlock(
        &self,
        exam_session_id: &str,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EditRequestRecord>, RepositoryError>;

    /// Mark approved requests with a lapsed unlock as auto-locked and completed
    async fn expire_unlocks(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError>;

    /// Pending request count per session
    async fn count_pending_by_session(&self) -> Result<HashMap<String, i64>, RepositoryError>;
}

/// SQLite-backed exam session repository
#[derive(Debug, Clone)]
pub struct ExamSessionRepository {
    pool: DatabasePool,
}

impl ExamSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SESSION_COLUMNS: &str = "SELECT id, name, session_date, academic_year, description, created_by,
    created_at, is_locked, lock_reason, locked_at, locked_by FROM exam_sessions";

fn map_session(row: &Row<'_>) -> rusqlite::Result<ExamSessionRecord> {
    Ok(ExamSessionRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        academic_year: row.get(3)?,
        description: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        is_locked: row.get(7)?,
        lock_reason: row.get(8)?,
        locked_at: row.get(9)?,
        locked_by: row.get(10)?,
    })
}

#[async_trait]
impl ExamSessionRepositoryTrait for ExamSessionRepository {
    async fn create(&self, s: &ExamSessionRecord) -> Result<(), RepositoryError> {
        debug!("Storing exam session: id={}, name={}", s.id, s.name);
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO exam_sessions (id, name, session_date, academic_year, description, created_by,
                created_at, is_locked, lock_reason, locked_at, locked_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                s.id, s.name, s.date, s.academic_year, s.description, s.created_by, s.created_at,
                s.is_locked, s.lock_reason, s.locked_at, s.locked_by,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ExamSessionRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", SESSION_COLUMNS), [id], map_session))
    }

    async fn list(&self) -> Result<Vec<ExamSessionRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at DESC", SESSION_COLUMNS))?;
        let sessions = stmt.query_map([], map_session)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    async fn update_lock(&self, s: &ExamSessionRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE exam_sessions SET is_locked = ?2, lock_reason = ?3, locked_at = ?4, locked_by = ?5
             WHERE id = ?1",
            params![s.id, s.is_locked, s.lock_reason, s.locked_at, s.locked_by],
        )?;
        expect_affected(affected, "exam session", &s.id)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM exam_sessions", [], |row| row.get(0))?)
    }
}

/// SQLite-backed edit request repository
#[derive(Debug, Clone)]
pub struct EditRequestRepository {
    pool: DatabasePool,
}

impl EditRequestRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const REQUEST_COLUMNS: &str = "SELECT id, exam_session_id, requested_by, requested_by_name, reason,
    specific_students, expected_completion_time, status, reviewed_by, admin_response, reviewed_at,
    temp_unlock_until, is_auto_locked, created_at, updated_at FROM edit_requests";

fn map_request(row: &Row<'_>) -> rusqlite::Result<EditRequestRecord> {
    Ok(EditRequestRecord {
        id: row.get(0)?,
        exam_session_id: row.get(1)?,
        requested_by: row.get(2)?,
        requested_by_name: row.get(3)?,
        reason: row.get(4)?,
        specific_students: json_column(row, 5)?,
        expected_completion_time: row.get(6)?,
        status: row.get(7)?,
        reviewed_by: row.get(8)?,
        admin_response: row.get(9)?,
        reviewed_at: row.get(10)?,
        temp_unlock_until: row.get(11)?,
        is_auto_locked: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

#[async_trait]
impl EditRequestRepositoryTrait for EditRequestRepository {
    async fn create(&self, r: &EditRequestRecord) -> Result<(), RepositoryError> {
        debug!("Storing edit request: id={}, session={}", r.id, r.exam_session_id);
        let students = to_json(&r.specific_students)?;
        let conn = self.pool.conn()?;
        conn.execute(
            "INSERT INTO edit_requests (id, exam_session_id, requested_by, requested_by_name, reason,
                specific_students, expected_completion_time, status, reviewed_by, admin_response,
                reviewed_at, temp_unlock_until, is_auto_locked, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                r.id, r.exam_session_id, r.requested_by, r.requested_by_name, r.reason, students,
                r.expected_completion_time, r.status, r.reviewed_by, r.admin_response, r.reviewed_at,
                r.temp_unlock_until, r.is_auto_locked, r.created_at, r.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<EditRequestRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(&format!("{} WHERE id = ?1", REQUEST_COLUMNS), [id], map_request))
    }

    async fn list(
        &self,
        requested_by: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<EditRequestRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR requested_by = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))?;
        let requests = stmt
            .query_map(params![requested_by, status], map_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    async fn update(&self, r: &EditRequestRecord) -> Result<(), RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE edit_requests SET status = ?2, reviewed_by = ?3, admin_response = ?4, reviewed_at = ?5,
                temp_unlock_until = ?6, is_auto_locked = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                r.id, r.status, r.reviewed_by, r.admin_response, r.reviewed_at, r.temp_unlock_until,
                r.is_auto_locked, r.updated_at,
            ],
        )?;
        expect_affected(affected, "edit request", &r.id)
    }

    async fn has_pending(&self, exam_session_id: &str, requested_by: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edit_requests
             WHERE exam_session_id = ?1 AND requested_by = ?2 AND status = 'pending'",
            [exam_session_id, requested_by],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn find_active_unlock(
        &self,
        exam_session_id: &str,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EditRequestRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        optional(conn.query_row(
            &format!(
                "{} WHERE exam_session_id = ?1 AND requested_by = ?2 AND status = 'approved'
                   AND temp_unlock_until > ?3
                 ORDER BY temp_unlock_until DESC LIMIT 1",
                REQUEST_COLUMNS
            ),
            params![exam_session_id, requested_by, now],
            map_request,
        ))
    }

    async fn expire_unlocks(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let conn = self.pool.conn()?;
        let affected = conn.execute(
            "UPDATE edit_requests SET status = 'completed', is_auto_locked = 1, updated_at = ?1
             WHERE status = 'approved' AND temp_unlock_until IS NOT NULL AND temp_unlock_until <= ?1",
            params![now],
        )?;
        Ok(affected)
    }

    async fn count_pending_by_session(&self) -> Result<HashMap<String, i64>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(
            "SELECT exam_session_id, COUNT(*) FROM edit_requests WHERE status = 'pending'
             GROUP BY exam_session_id",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }
}
