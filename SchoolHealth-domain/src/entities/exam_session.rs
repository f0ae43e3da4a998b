use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Default length of a temporary unlock
pub const DEFAULT_UNLOCK_HOURS: i64 = 24;

/// Longest temporary unlock an admin may grant
pub const MAX_UNLOCK_HOURS: i64 = 168;

text_enum! {
    /// Lifecycle of an edit request
    EditRequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Admin decision on a pending request
    ReviewAction {
        Approve => "approve",
        Reject => "reject",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ExamSession {
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

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateExamSessionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub date: NaiveDate,
    pub academic_year: Option<String>,
    pub description: Option<String>,
}

/// Session with its activity counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ExamSessionOverview {
    #[serde(flatten)]
    pub session: ExamSession,
    pub record_count: i64,
    pub pending_requests: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ToggleLockRequest {
    pub is_locked: bool,
    pub lock_reason: Option<String>,
}

/// Whether a doctor may change a session's data right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct EditPermission {
    pub can_edit: bool,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub temp_unlock_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct EditRequest {
    pub id: String,
    pub exam_session_id: String,
    pub requested_by: String,
    pub requested_by_name: String,
    pub reason: String,
    pub specific_students: Vec<String>,
    pub expected_completion_time: Option<DateTime<Utc>>,
    pub status: EditRequestStatus,
    pub reviewed_by: Option<String>,
    pub admin_response: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub temp_unlock_until: Option<DateTime<Utc>>,
    pub is_auto_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateEditRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Exam session is required"))]
    pub exam_session_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,

    #[serde(default)]
    pub specific_students: Vec<String>,

    pub expected_completion_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ReviewEditRequest {
    pub action: ReviewAction,
    pub admin_response: Option<String>,
    /// Hours of temporary unlock on approval, 1 to 168
    pub temp_unlock_hours: Option<i64>,
}
