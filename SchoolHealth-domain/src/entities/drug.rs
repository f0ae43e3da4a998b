use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Low-stock threshold used when the caller gives none
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Expiry window in days used when the caller gives none
pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

/// A drug stock entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Drug {
    pub id: String,
    pub image: Option<String>,
    pub name: String,
    pub code: String,
    pub drug_type: String,
    pub unit: String,
    pub inventory_quantity: i64,
    pub expiry_date: NaiveDate,
    pub supplier_name: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// Body of drug create and update calls
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct DrugRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Drug name is required"))]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Drug code is required"))]
    pub code: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Drug type is required"))]
    pub drug_type: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: String,

    /// Must not be negative
    pub inventory_quantity: i64,

    pub expiry_date: NaiveDate,

    #[serde(default)]
    pub supplier_name: String,

    #[serde(default)]
    pub notes: String,

    /// Stored image path, filled from an upload
    pub image: Option<String>,
}

impl DrugRequest {
    /// Trim every text value in place
    pub fn trimmed(mut self) -> Self {
        for value in [
            &mut self.name,
            &mut self.code,
            &mut self.drug_type,
            &mut self.unit,
            &mut self.supplier_name,
            &mut self.notes,
        ] {
            *value = value.trim().to_string();
        }
        self
    }
}

/// Drugs needing attention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct DrugAlerts {
    pub low_stock_threshold: i64,
    pub expiry_window_days: i64,
    pub low_stock: Vec<Drug>,
    /// Expired or expiring inside the window
    pub expiring: Vec<Drug>,
}

/// Outcome of a drug spreadsheet import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct DrugImportSummary {
    pub total_rows: usize,
    pub inserted_count: usize,
}
