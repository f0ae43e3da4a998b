use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::medical::{Abnormality, CreateAbnormalityRequest, CreatePrescriptionRequest, Prescription};

use super::ensure_can_read;
use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};

#[utoipa::path(
    post,
    path = "/api/doctor/abnormalities",
    request_body = CreateAbnormalityRequest,
    responses(
        (status = 201, description = "Abnormality recorded", body = Abnormality),
        (status = 400, description = "Invalid abnormality", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state, request), fields(student = %request.student_id))]
pub async fn create_abnormality(
    State(state): State<AppState>,
    Json(request): Json<CreateAbnormalityRequest>,
) -> ApiResult<(StatusCode, Json<Abnormality>)> {
    let abnormality = state.services.medical.create_abnormality(request).await?;
    Ok((StatusCode::CREATED, Json(abnormality)))
}

/// All abnormalities, newest first
#[utoipa::path(
    get,
    path = "/api/doctor/abnormalities",
    responses((status = 200, description = "Abnormalities", body = Vec<Abnormality>)),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state))]
pub async fn list_abnormalities(State(state): State<AppState>) -> ApiResult<Json<Vec<Abnormality>>> {
    Ok(Json(state.services.medical.list_abnormalities().await?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/abnormalities/student/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses((status = 200, description = "The student's abnormalities", body = Vec<Abnormality>)),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state))]
pub async fn student_abnormalities(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Abnormality>>> {
    Ok(Json(state.services.medical.abnormalities_for_student(&student_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/abnormalities/{id}",
    params(("id" = String, Path, description = "Abnormality id")),
    responses(
        (status = 200, description = "Abnormality deleted", body = MessageResponse),
        (status = 404, description = "No such abnormality", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state))]
pub async fn delete_abnormality(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.medical.delete_abnormality(&id).await?;
    Ok(Json(MessageResponse::new("Abnormality deleted")))
}

/// Prescribe medicines for an abnormality
#[utoipa::path(
    post,
    path = "/api/doctor/prescriptions",
    request_body = CreatePrescriptionRequest,
    responses(
        (status = 201, description = "Prescription created", body = Prescription),
        (status = 400, description = "Invalid prescription or unknown drug", body = ErrorResponse),
        (status = 404, description = "No such abnormality", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state, request), fields(abnormality = %request.abnormality_id))]
pub async fn add_prescription(
    State(state): State<AppState>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    let prescription = state.services.medical.add_prescription(request).await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

#[utoipa::path(
    get,
    path = "/api/doctor/prescriptions/student/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses((status = 200, description = "The student's prescriptions", body = Vec<Prescription>)),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state))]
pub async fn student_prescriptions(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(state.services.medical.prescriptions_for_student(&student_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/prescriptions/abnormality/{id}",
    params(("id" = String, Path, description = "Abnormality id")),
    responses((status = 200, description = "Prescriptions for the abnormality", body = Vec<Prescription>)),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state))]
pub async fn abnormality_prescriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(state.services.medical.prescriptions_for_abnormality(&id).await?))
}

/// A student's own abnormality history
#[utoipa::path(
    get,
    path = "/api/user/abnormalities/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses(
        (status = 200, description = "Abnormalities", body = Vec<Abnormality>),
        (status = 403, description = "Another student's records", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn my_abnormalities(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Abnormality>>> {
    ensure_can_read(&user, &student_id)?;
    Ok(Json(state.services.medical.abnormalities_for_student(&student_id).await?))
}

/// A student's own prescriptions
#[utoipa::path(
    get,
    path = "/api/user/prescriptions/{student_id}",
    params(("student_id" = String, Path, description = "School-issued student id")),
    responses(
        (status = 200, description = "Prescriptions", body = Vec<Prescription>),
        (status = 403, description = "Another student's records", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "medical"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn my_prescriptions(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Prescription>>> {
    ensure_can_read(&user, &student_id)?;
    Ok(Json(state.services.medical.prescriptions_for_student(&student_id).await?))
}
