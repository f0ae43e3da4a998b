// Domain entities and value objects

use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Declare a unit enum that is stored and serialized as a fixed text code
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[cfg_attr(feature = "with-api", derive(utoipa::ToSchema))]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $code)] $variant,)+
        }

        impl $name {
            /// Text code used in storage and JSON
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Parse a stored text code
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod account;
pub mod analytics;
pub mod backup;
pub mod chat;
pub mod conversions;
pub mod doctor;
pub mod drug;
pub mod exam_session;
pub mod medical;
pub mod news;
pub mod physical_fitness;

// Re-export common types for easier imports
pub use account::{AccountRole, ChangePasswordRequest, CreateStudentRequest, RegisterRequest, Student, StudentFilter, StudentImportSummary, UpdateProfileRequest};
pub use doctor::{CreateDoctorRequest, Doctor, UpdateDoctorProfileRequest};
pub use physical_fitness::{BmiRating, HeightRating, PhysicalFitness, VitalRating, WeightRating};

/// Two-line postal address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
}

/// A spreadsheet row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct InvalidRow {
    /// 1-based spreadsheet line, counting the header
    pub row: usize,
    /// Required columns that were empty or unparsable
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Normalize a cohort label: first character uppercase, the rest lowercase
pub fn normalize_cohort(cohort: &str) -> String {
    let trimmed = cohort.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cohort() {
        assert_eq!(normalize_cohort("k47"), "K47");
        assert_eq!(normalize_cohort(" kHOA-47 "), "Khoa-47");
        assert_eq!(normalize_cohort(""), "");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.126), -0.13);
    }
}
