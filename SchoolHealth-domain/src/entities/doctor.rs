use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use super::Address;

/// A school doctor, without credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: f64,
    pub address: Address,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin request to add a doctor
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateDoctorRequest {
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
    #[validate(length(min = 1, message = "Speciality is required"))]
    pub speciality: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Degree is required"))]
    pub degree: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Experience is required"))]
    pub experience: String,

    #[serde(default)]
    pub about: String,

    #[serde(default)]
    #[validate(range(min = 0.0, message = "Fees cannot be negative"))]
    pub fees: f64,

    #[serde(default)]
    pub address: Address,

    /// Stored image path, filled from an upload
    pub image: Option<String>,
}

/// Fields a doctor may change on their profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateDoctorProfileRequest {
    #[validate(range(min = 0.0, message = "Fees cannot be negative"))]
    pub fees: Option<f64>,
    pub address: Option<Address>,
    pub available: Option<bool>,
    pub about: Option<String>,
}
