use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for an exam session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSessionRecord {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    pub academic_year: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
}

/// Storage model for a doctor's request to edit a locked session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequestRecord {
    pub id: String,
    pub exam_session_id: String,
    pub requested_by: String,
    pub requested_by_name: String,
    pub reason: String,
    pub specific_students: Vec<String>,
    pub expected_completion_time: Option<DateTime<Utc>>,
    /// `pending`, `approved`, `rejected`, `completed` or `cancelled`
    pub status: String,
    pub reviewed_by: Option<String>,
    pub admin_response: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub temp_unlock_until: Option<DateTime<Utc>>,
    pub is_auto_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
