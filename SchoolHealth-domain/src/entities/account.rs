use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use super::Address;

text_enum! {
    /// Role of a self-service account
    AccountRole {
        Student => "student",
        User => "user",
    }
}

/// A student or plain user account, without credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub address: Address,
    pub gender: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub role: AccountRole,
    pub cohort: Option<String>,
    pub student_id: Option<String>,
    pub major: Option<String>,
    pub about: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin request to add a student
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateStudentRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Cohort is required"))]
    pub cohort: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Student id is required"))]
    pub student_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Major is required"))]
    pub major: String,

    pub about: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    /// Stored image path, filled from an upload
    pub image: Option<String>,
}

/// Self-service registration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Fields an account holder may change on their own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    #[validate(length(max = 2000, message = "About cannot exceed 2000 characters"))]
    pub about: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Optional list filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct StudentFilter {
    pub cohort: Option<String>,
    pub major: Option<String>,
}

/// Outcome of a student spreadsheet import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct StudentImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub skipped_duplicates: usize,
    pub skipped_invalid: usize,
}

/// Flat row written by the student export
#[derive(Debug, Clone, Serialize)]
pub struct StudentExportRow {
    pub name: String,
    pub email: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub cohort: String,
    pub major: String,
    pub gender: String,
    pub dob: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: String,
}

impl From<&Student> for StudentExportRow {
    fn from(s: &Student) -> Self {
        Self {
            name: s.name.clone(),
            email: s.email.clone(),
            student_id: s.student_id.clone().unwrap_or_default(),
            cohort: s.cohort.clone().unwrap_or_default(),
            major: s.major.clone().unwrap_or_default(),
            gender: s.gender.clone().unwrap_or_default(),
            dob: s.dob.clone().unwrap_or_default(),
            phone: s.phone.clone().unwrap_or_default(),
            address_line1: s.address.line1.clone(),
            address_line2: s.address.line2.clone(),
        }
    }
}
