use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for one physical-fitness measurement
///
/// Ratings are stored as their snake_case names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalFitnessRecord {
    pub id: String,
    pub exam_session_id: String,
    pub student_id: String,
    pub cohort: Option<String>,
    pub gender: Option<String>,
    pub follow_date: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub z_score_height: Option<f64>,
    pub height_rating: Option<String>,
    pub z_score_weight: Option<f64>,
    pub weight_rating: Option<String>,
    pub z_score_weight_height: Option<f64>,
    pub bmi: Option<f64>,
    pub bmi_rating: Option<String>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub blood_pressure_rating: Option<String>,
    pub heart_rate: Option<f64>,
    pub heart_rate_rating: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
