use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for an abnormality found during a health exam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalityRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub symptoms: Vec<String>,
    pub temporary_treatment: String,
    pub created_at: DateTime<Utc>,
}

/// One prescribed medicine, stored inside the prescription's JSON column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub drug_id: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub meal_timing: String,
}

/// Storage model for a prescription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionRecord {
    pub id: String,
    pub abnormality_id: String,
    pub student_id: String,
    pub doctor_name: String,
    pub prescription_date: NaiveDate,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub medicines: Vec<MedicineRecord>,
    pub created_at: DateTime<Utc>,
}
