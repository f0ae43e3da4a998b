use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

text_enum! {
    /// Height classification from the height Z-score
    HeightRating {
        VeryShort => "very_short",
        Short => "short",
        Normal => "normal",
        Tall => "tall",
    }
}

text_enum! {
    /// Weight classification from the weight Z-score
    WeightRating {
        SeverelyUnderweight => "severely_underweight",
        Underweight => "underweight",
        Normal => "normal",
        Overweight => "overweight",
    }
}

text_enum! {
    /// BMI classification
    BmiRating {
        Underweight => "underweight",
        Normal => "normal",
        Overweight => "overweight",
        Obese1 => "obese_1",
        Obese2 => "obese_2",
        Obese3 => "obese_3",
    }
}

text_enum! {
    /// Three-level rating used for blood pressure and heart rate
    VitalRating {
        Low => "low",
        Normal => "normal",
        High => "high",
    }
}

/// One physical-fitness measurement with its derived assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PhysicalFitness {
    pub id: String,
    pub exam_session_id: String,
    pub student_id: String,
    pub cohort: Option<String>,
    pub gender: Option<String>,
    pub follow_date: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub z_score_height: Option<f64>,
    pub height_rating: Option<HeightRating>,
    pub z_score_weight: Option<f64>,
    pub weight_rating: Option<WeightRating>,
    pub z_score_weight_height: Option<f64>,
    pub bmi: Option<f64>,
    pub bmi_rating: Option<BmiRating>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub blood_pressure_rating: Option<VitalRating>,
    pub heart_rate: Option<f64>,
    pub heart_rate_rating: Option<VitalRating>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Measurements entered by a doctor; derived fields are always recomputed
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SaveFitnessRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Exam session is required"))]
    pub exam_session_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Student id is required"))]
    pub student_id: String,

    pub cohort: Option<String>,
    pub gender: Option<String>,
    #[serde(default)]
    pub follow_date: String,

    /// Centimetres, in (0, 300]
    pub height: Option<f64>,
    /// Kilograms, in (0, 500]
    pub weight: Option<f64>,

    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub heart_rate: Option<f64>,
}

/// Overview of the records in one session, or all sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct FitnessStatus {
    pub total: usize,
    /// Records with both height and weight
    pub measured: usize,
    pub bmi_stats: BTreeMap<String, usize>,
    pub male: usize,
    pub female: usize,
}

/// A student skipped during import because the session already has their record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct DuplicateRow {
    pub row: usize,
    pub student_id: String,
}

/// Outcome of a physical-fitness spreadsheet import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct FitnessImportSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub inserted_count: usize,
    pub duplicate_count: usize,
    pub skipped_count: usize,
    pub duplicates: Vec<DuplicateRow>,
}

/// Change between two sessions, second minus first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct FitnessDifferences {
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub heart_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SessionComparison {
    pub first: PhysicalFitness,
    pub second: PhysicalFitness,
    pub differences: FitnessDifferences,
}

/// Scores derived from a student's latest record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct HealthScores {
    pub physical: u8,
    pub mental: u8,
    pub cardio: u8,
    pub respiratory: u8,
    pub overall: u8,
}

/// Exam session a student has records in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct StudentSession {
    pub exam_session_id: String,
    pub name: String,
    pub date: chrono::NaiveDate,
    pub academic_year: Option<String>,
}

/// Flat row written by the physical-fitness export
#[derive(Debug, Clone, Serialize)]
pub struct FitnessExportRow {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub cohort: String,
    pub gender: String,
    pub follow_date: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub z_score_height: Option<f64>,
    pub height_rating: String,
    pub z_score_weight: Option<f64>,
    pub weight_rating: String,
    pub z_score_weight_height: Option<f64>,
    pub bmi: Option<f64>,
    pub bmi_rating: String,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub blood_pressure_rating: String,
    pub heart_rate: Option<f64>,
    pub heart_rate_rating: String,
}

fn rating_text<T: std::fmt::Display>(rating: &Option<T>) -> String {
    rating.as_ref().map(|r| r.to_string()).unwrap_or_default()
}

impl From<&PhysicalFitness> for FitnessExportRow {
    fn from(r: &PhysicalFitness) -> Self {
        Self {
            student_id: r.student_id.clone(),
            cohort: r.cohort.clone().unwrap_or_default(),
            gender: r.gender.clone().unwrap_or_default(),
            follow_date: r.follow_date.clone(),
            height: r.height,
            weight: r.weight,
            z_score_height: r.z_score_height,
            height_rating: rating_text(&r.height_rating),
            z_score_weight: r.z_score_weight,
            weight_rating: rating_text(&r.weight_rating),
            z_score_weight_height: r.z_score_weight_height,
            bmi: r.bmi,
            bmi_rating: rating_text(&r.bmi_rating),
            systolic: r.systolic,
            diastolic: r.diastolic,
            blood_pressure_rating: rating_text(&r.blood_pressure_rating),
            heart_rate: r.heart_rate,
            heart_rate_rating: rating_text(&r.heart_rate_rating),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_codes_round_trip_through_json() {
        assert_eq!(serde_json::to_string(&BmiRating::Obese2).unwrap(), "\"obese_2\"");
        assert_eq!(BmiRating::parse("obese_3"), Some(BmiRating::Obese3));
        assert_eq!(HeightRating::parse("giant"), None);
        assert_eq!(WeightRating::SeverelyUnderweight.to_string(), "severely_underweight");
    }
}
