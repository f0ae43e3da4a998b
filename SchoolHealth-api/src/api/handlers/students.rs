use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use tracing::{info, instrument};

use school_health_domain::entities::{Address, CreateStudentRequest, Student, StudentFilter, StudentImportSummary};

use super::csv_attachment;
use crate::api::error::{ApiError, ApiResult};
use crate::api::uploads::{store_optional, MultipartForm};
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse, StudentQuery};
use crate::entities::forms::{ImportForm, StudentForm};

/// Create a student account from a multipart form
#[utoipa::path(
    post,
    path = "/api/admin/students",
    request_body(content = StudentForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid student", body = ErrorResponse),
        (status = 409, description = "Email or student id already in use", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state, multipart))]
pub async fn add_student(State(state): State<AppState>, multipart: Multipart) -> ApiResult<(StatusCode, Json<Student>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = store_optional(&mut form, "image", &state.upload_dir).await?;

    let request = CreateStudentRequest {
        name: form.text_or_empty("name"),
        email: form.text_or_empty("email"),
        password: form.text_or_empty("password"),
        cohort: form.text_or_empty("cohort"),
        student_id: form.text_or_empty("student_id"),
        major: form.text_or_empty("major"),
        about: form.text("about"),
        dob: form.text("dob"),
        gender: form.text("gender"),
        phone: form.text("phone"),
        address: form.json::<Address>("address")?.unwrap_or_default(),
        image,
    };

    let student = state.services.accounts.add_student(request).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// List students, optionally by cohort and major
#[utoipa::path(
    get,
    path = "/api/admin/students",
    params(StudentQuery),
    responses((status = 200, description = "Matching students", body = Vec<Student>)),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state))]
pub async fn list_students(State(state): State<AppState>, Query(query): Query<StudentQuery>) -> ApiResult<Json<Vec<Student>>> {
    let filter: StudentFilter = query.into();
    Ok(Json(state.services.accounts.list_students(&filter).await?))
}

/// Student directory for staff
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Matching students", body = Vec<Student>),
        (status = 403, description = "Staff only", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state))]
pub async fn student_directory(
    State(state): State<AppState>,
    Query(query): Query<StudentQuery>,
) -> ApiResult<Json<Vec<Student>>> {
    let filter: StudentFilter = query.into();
    Ok(Json(state.services.accounts.list_students(&filter).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/students/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Student deleted", body = MessageResponse),
        (status = 404, description = "No such student", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state))]
pub async fn delete_student(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.accounts.delete_student(&id).await?;
    Ok(Json(MessageResponse::new("Student deleted")))
}

/// Bulk student import from .xlsx or .csv
#[utoipa::path(
    post,
    path = "/api/admin/students/import",
    request_body(content = ImportForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import summary", body = StudentImportSummary),
        (status = 400, description = "Unreadable file or invalid rows", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state, multipart))]
pub async fn import_students(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<StudentImportSummary>> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("file: A spreadsheet is required".to_string()))?;

    let summary = state.services.accounts.import_students(&file.file_name, &file.bytes).await?;
    info!("Imported {} of {} student rows", summary.imported, summary.total_rows);
    Ok(Json(summary))
}

/// Students as a CSV download
#[utoipa::path(
    get,
    path = "/api/admin/students/export",
    params(StudentQuery),
    responses((status = 200, description = "CSV file", content_type = "text/csv", body = String)),
    security(("bearer" = [])),
    tag = "students"
)]
#[instrument(skip(state))]
pub async fn export_students(State(state): State<AppState>, Query(query): Query<StudentQuery>) -> ApiResult<Response> {
    let filter: StudentFilter = query.into();
    let bytes = state.services.accounts.export_students(&filter).await?;
    Ok(csv_attachment("students.csv", bytes))
}
