use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a drug stock entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
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
