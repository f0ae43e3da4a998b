//! Field layouts of the multipart endpoints.
//!
//! Handlers read these forms field by field; the structs only describe
//! them in the OpenAPI document.

#![allow(dead_code)]

use utoipa::ToSchema;

/// Doctor creation form
#[derive(ToSchema)]
pub struct DoctorForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: Option<String>,
    pub fees: Option<f64>,
    /// JSON object `{"line1": "...", "line2": "..."}`
    pub address: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// Student creation form
#[derive(ToSchema)]
pub struct StudentForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub cohort: String,
    pub student_id: String,
    pub major: String,
    pub about: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    /// JSON object `{"line1": "...", "line2": "..."}`
    pub address: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// Profile update form
#[derive(ToSchema)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub phone: Option<String>,
    /// JSON object `{"line1": "...", "line2": "..."}`
    pub address: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub about: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// Drug form, for both add and update
#[derive(ToSchema)]
pub struct DrugForm {
    pub name: String,
    pub code: String,
    pub drug_type: String,
    pub unit: String,
    pub inventory_quantity: i64,
    /// YYYY-MM-DD
    pub expiry_date: String,
    pub supplier_name: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// News form; `file` is either an upload or a URL
#[derive(ToSchema)]
pub struct NewsForm {
    pub title: String,
    pub category: String,
    /// YYYY-MM-DD
    pub date: String,
    pub content: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Spreadsheet import form (.xlsx or .csv)
#[derive(ToSchema)]
pub struct ImportForm {
    /// Required for physical fitness imports
    pub exam_session_id: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}
