use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a doctor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub address_line1: String,
    pub address_line2: String,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}
