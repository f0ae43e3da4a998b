use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use tracing::{info, instrument};

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::physical_fitness::{
    FitnessImportSummary, FitnessStatus, HealthScores, SaveFitnessRequest, SessionComparison, StudentSession,
};
use school_health_domain::entities::PhysicalFitness;

use super::{csv_attachment, ensure_can_read};
use crate::api::error::{ApiError, ApiResult};
use crate::api::uploads::MultipartForm;
use crate::api::AppState;
use crate::entities::common::{CompareQuery, ErrorResponse, SessionQuery};
use crate::entities::forms::ImportForm;

/// Create or update a student's measurements for one session
#[utoipa::path(
    post,
    path = "/api/doctor/physical-fitness",
    request_body = SaveFitnessRequest,
    responses(
        (status = 200, description = "Saved record with its assessment", body = PhysicalFitness),
        (status = 400, description = "Invalid measurements", body = ErrorResponse),
        (status = 403, description = "Exam session is locked", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user, request), fields(doctor = %user.user_id, student = %request.student_id))]
pub async fn save_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<SaveFitnessRequest>,
) -> ApiResult<Json<PhysicalFitness>> {
    let record = state.services.fitness.save(request, &user.user_id, user.role).await?;
    Ok(Json(record))
}

/// Records, optionally for one exam session
#[utoipa::path(
    get,
    path = "/api/doctor/physical-fitness",
    params(SessionQuery),
    responses((status = 200, description = "Records", body = Vec<PhysicalFitness>)),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<PhysicalFitness>>> {
    Ok(Json(state.services.fitness.list(query.exam_session_id.as_deref()).await?))
}

/// Counts by BMI rating and gender
#[utoipa::path(
    get,
    path = "/api/doctor/physical-fitness/status",
    params(SessionQuery),
    responses((status = 200, description = "Status overview", body = FitnessStatus)),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state))]
pub async fn record_status(State(state): State<AppState>, Query(query): Query<SessionQuery>) -> ApiResult<Json<FitnessStatus>> {
    Ok(Json(state.services.fitness.status(query.exam_session_id.as_deref()).await?))
}

/// Import one session's measurements from .xlsx or .csv
#[utoipa::path(
    post,
    path = "/api/doctor/physical-fitness/import",
    request_body(content = ImportForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Import summary", body = FitnessImportSummary),
        (status = 400, description = "Unreadable file or invalid rows", body = ErrorResponse),
        (status = 403, description = "Exam session is locked", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user, multipart), fields(doctor = %user.user_id))]
pub async fn import_records(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FitnessImportSummary>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let session_id = form.text_or_empty("exam_session_id");
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("file: A spreadsheet is required".to_string()))?;

    let summary = state
        .services
        .fitness
        .import(&session_id, &file.file_name, &file.bytes, &user.user_id, user.role)
        .await?;
    info!("Imported {} fitness rows into session {}", summary.inserted_count, session_id);
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Records as a CSV download
#[utoipa::path(
    get,
    path = "/api/doctor/physical-fitness/export",
    params(SessionQuery),
    responses((status = 200, description = "CSV file", content_type = "text/csv", body = String)),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state))]
pub async fn export_records(State(state): State<AppState>, Query(query): Query<SessionQuery>) -> ApiResult<Response> {
    let bytes = state.services.fitness.export(query.exam_session_id.as_deref()).await?;
    Ok(csv_attachment("physical_fitness.csv", bytes))
}

/// One student's records, newest first
#[utoipa::path(
    get,
    path = "/api/user/physical/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id"), SessionQuery),
    responses(
        (status = 200, description = "Records", body = Vec<PhysicalFitness>),
        (status = 403, description = "Another student's records", body = ErrorResponse),
        (status = 404, description = "No records", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn student_records(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<PhysicalFitness>>> {
    ensure_can_read(&user, &student_id)?;
    let records = state
        .services
        .fitness
        .student_records(&student_id, query.exam_session_id.as_deref())
        .await?;
    Ok(Json(records))
}

/// Sessions the student has records in
#[utoipa::path(
    get,
    path = "/api/user/exam-sessions/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses(
        (status = 200, description = "Sessions", body = Vec<StudentSession>),
        (status = 403, description = "Another student's records", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn student_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<StudentSession>>> {
    ensure_can_read(&user, &student_id)?;
    Ok(Json(state.services.fitness.student_sessions(&student_id).await?))
}

/// Measurement changes between two sessions
#[utoipa::path(
    get,
    path = "/api/user/compare/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id"), CompareQuery),
    responses(
        (status = 200, description = "Comparison", body = SessionComparison),
        (status = 403, description = "Another student's records", body = ErrorResponse),
        (status = 404, description = "Missing record in either session", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn compare_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<SessionComparison>> {
    ensure_can_read(&user, &student_id)?;
    let comparison = state
        .services
        .fitness
        .compare(&student_id, &query.first, &query.second)
        .await?;
    Ok(Json(comparison))
}

/// Scores derived from the latest record
#[utoipa::path(
    get,
    path = "/api/user/health-scores/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses(
        (status = 200, description = "Scores", body = HealthScores),
        (status = 403, description = "Another student's records", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "physical-fitness"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn health_scores(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<HealthScores>> {
    ensure_can_read(&user, &student_id)?;
    Ok(Json(state.services.fitness.health_scores(&student_id).await?))
}
