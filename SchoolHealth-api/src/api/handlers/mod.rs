// API handlers module
pub mod analytics;
pub mod auth;
pub mod backups;
pub mod doctors;
pub mod drugs;
pub mod exam_sessions;
pub mod health;
pub mod medical;
pub mod messages;
pub mod news;
pub mod physical_fitness;
pub mod profile;
pub mod students;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use school_health_domain::auth::UserInfo;

use crate::api::error::{ApiError, ApiResult};

/// CSV download response
pub(crate) fn csv_attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response()
}

/// Students may only read their own records
pub(crate) fn ensure_can_read(user: &UserInfo, student_id: &str) -> ApiResult<()> {
    if user.can_read_student(student_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Students can only view their own records".to_string()))
    }
}
