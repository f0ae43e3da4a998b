use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use school_health_domain::entities::StudentFilter;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Student list filters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Cohort, normalized before matching
    pub cohort: Option<String>,
    pub major: Option<String>,
}

impl From<StudentQuery> for StudentFilter {
    fn from(query: StudentQuery) -> Self {
        StudentFilter { cohort: query.cohort, major: query.major }
    }
}

/// Narrow results to one exam session
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    pub exam_session_id: Option<String>,
}

/// Edit request status filter
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// pending, approved, rejected, completed or cancelled
    pub status: Option<String>,
}

/// Drug alert thresholds
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertQuery {
    /// Low-stock threshold (default 10)
    pub threshold: Option<i64>,
    /// Expiry window in days (default 30)
    pub days: Option<i64>,
}

/// The two exam sessions to compare
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompareQuery {
    pub first: String,
    pub second: String,
}

/// Ids of users with an open event stream
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OnlineUsers {
    pub users: Vec<String>,
}
