use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a student or plain user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub address_line1: String,
    pub address_line2: String,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    /// `student` or `user`
    pub role: String,
    pub cohort: Option<String>,
    pub student_id: Option<String>,
    pub major: Option<String>,
    pub about: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for account listings; `None` fields match everything
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub role: Option<String>,
    pub cohort: Option<String>,
    pub major: Option<String>,
}
