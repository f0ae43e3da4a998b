use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

text_enum! {
    /// When a medicine is taken relative to meals
    MealTiming {
        Before => "before",
        After => "after",
        With => "with",
        Anytime => "anytime",
    }
}

impl Default for MealTiming {
    fn default() -> Self {
        MealTiming::After
    }
}

/// An abnormality noted during a health exam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Abnormality {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub symptoms: Vec<String>,
    pub temporary_treatment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateAbnormalityRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Student id is required"))]
    pub student_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Student name is required"))]
    pub student_name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Doctor name is required"))]
    pub doctor_name: String,

    pub date: NaiveDate,

    #[serde(default)]
    #[validate(length(min = 1, message = "At least one symptom is required"))]
    pub symptoms: Vec<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "Temporary treatment is required"))]
    pub temporary_treatment: String,
}

/// One prescribed medicine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Medicine {
    pub drug_id: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    #[serde(default)]
    pub meal_timing: MealTiming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Prescription {
    pub id: String,
    pub abnormality_id: String,
    pub student_id: String,
    pub doctor_name: String,
    pub prescription_date: NaiveDate,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub medicines: Vec<Medicine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreatePrescriptionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Abnormality id is required"))]
    pub abnormality_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Student id is required"))]
    pub student_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Doctor name is required"))]
    pub doctor_name: String,

    pub prescription_date: NaiveDate,

    #[serde(default)]
    #[validate(length(min = 1, message = "Diagnosis is required"))]
    pub diagnosis: String,

    pub notes: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "At least one medicine is required"))]
    pub medicines: Vec<Medicine>,
}
