use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::exam_session::{
    CreateEditRequest, CreateExamSessionRequest, EditPermission, EditRequest, EditRequestStatus, ExamSession,
    ExamSessionOverview, ReviewEditRequest, ToggleLockRequest,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, StatusQuery};

fn parse_status(query: StatusQuery) -> ApiResult<Option<EditRequestStatus>> {
    query
        .status
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            EditRequestStatus::parse(s.trim()).ok_or_else(|| ApiError::BadRequest(format!("status: Unknown status '{}'", s)))
        })
        .transpose()
}

#[utoipa::path(
    post,
    path = "/api/admin/exam-sessions",
    request_body = CreateExamSessionRequest,
    responses(
        (status = 201, description = "Session created", body = ExamSession),
        (status = 400, description = "Invalid session", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "exam-sessions"
)]
#[instrument(skip(state, user, request), fields(admin = %user.user_id))]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateExamSessionRequest>,
) -> ApiResult<(StatusCode, Json<ExamSession>)> {
    let session = state.services.exam_sessions.create_session(request, &user.user_id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Sessions, newest date first
#[utoipa::path(
    get,
    path = "/api/doctor/exam-sessions",
    responses((status = 200, description = "Exam sessions", body = Vec<ExamSession>)),
    security(("bearer" = [])),
    tag = "exam-sessions"
)]
#[instrument(skip(state))]
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<ExamSession>>> {
    Ok(Json(state.services.exam_sessions.list_sessions().await?))
}

/// Sessions with record counts and pending requests
#[utoipa::path(
    get,
    path = "/api/admin/exam-sessions/overview",
    responses((status = 200, description = "Session overview", body = Vec<ExamSessionOverview>)),
    security(("bearer" = [])),
    tag = "exam-sessions"
)]
#[instrument(skip(state))]
pub async fn sessions_overview(State(state): State<AppState>) -> ApiResult<Json<Vec<ExamSessionOverview>>> {
    Ok(Json(state.services.exam_sessions.overview().await?))
}

/// Lock or unlock a session
#[utoipa::path(
    post,
    path = "/api/admin/exam-sessions/{id}/lock",
    params(("id" = String, Path, description = "Exam session id")),
    request_body = ToggleLockRequest,
    responses(
        (status = 200, description = "Updated session", body = ExamSession),
        (status = 404, description = "No such session", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "exam-sessions"
)]
#[instrument(skip(state, user, request), fields(admin = %user.user_id))]
pub async fn toggle_lock(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<ToggleLockRequest>,
) -> ApiResult<Json<ExamSession>> {
    Ok(Json(state.services.exam_sessions.toggle_lock(&id, request, &user.user_id).await?))
}

/// Whether the calling doctor may edit the session now
#[utoipa::path(
    get,
    path = "/api/doctor/exam-sessions/{id}/permission",
    params(("id" = String, Path, description = "Exam session id")),
    responses(
        (status = 200, description = "Edit permission", body = EditPermission),
        (status = 404, description = "No such session", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "exam-sessions"
)]
#[instrument(skip(state, user), fields(doctor = %user.user_id))]
pub async fn edit_permission(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> ApiResult<Json<EditPermission>> {
    Ok(Json(state.services.exam_sessions.edit_permission(&id, &user.user_id, user.role).await?))
}

/// Ask for temporary edit access to a locked session
#[utoipa::path(
    post,
    path = "/api/doctor/edit-requests",
    request_body = CreateEditRequest,
    responses(
        (status = 201, description = "Request created", body = EditRequest),
        (status = 400, description = "Invalid request or session not locked", body = ErrorResponse),
        (status = 409, description = "Pending request or active unlock exists", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state, user, request), fields(doctor = %user.user_id))]
pub async fn request_edit_access(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateEditRequest>,
) -> ApiResult<(StatusCode, Json<EditRequest>)> {
    let doctor = state.services.doctors.profile(&user.user_id).await?;
    let created = state
        .services
        .exam_sessions
        .request_edit_access(request, &user.user_id, &doctor.name)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The calling doctor's requests
#[utoipa::path(
    get,
    path = "/api/doctor/edit-requests",
    params(StatusQuery),
    responses(
        (status = 200, description = "Own requests", body = Vec<EditRequest>),
        (status = 400, description = "Unknown status", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state, user), fields(doctor = %user.user_id))]
pub async fn my_requests(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Vec<EditRequest>>> {
    let status = parse_status(query)?;
    Ok(Json(state.services.exam_sessions.list_requests(Some(&user.user_id), status).await?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/edit-requests/{id}/cancel",
    params(("id" = String, Path, description = "Edit request id")),
    responses(
        (status = 200, description = "Cancelled request", body = EditRequest),
        (status = 400, description = "Request is not pending", body = ErrorResponse),
        (status = 403, description = "Not the requester", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state, user), fields(doctor = %user.user_id))]
pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> ApiResult<Json<EditRequest>> {
    Ok(Json(state.services.exam_sessions.cancel_request(&id, &user.user_id).await?))
}

/// All requests, optionally by status
#[utoipa::path(
    get,
    path = "/api/admin/edit-requests",
    params(StatusQuery),
    responses(
        (status = 200, description = "Requests", body = Vec<EditRequest>),
        (status = 400, description = "Unknown status", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state))]
pub async fn all_requests(State(state): State<AppState>, Query(query): Query<StatusQuery>) -> ApiResult<Json<Vec<EditRequest>>> {
    let status = parse_status(query)?;
    Ok(Json(state.services.exam_sessions.list_requests(None, status).await?))
}

/// Approve or reject a pending request
#[utoipa::path(
    post,
    path = "/api/admin/edit-requests/{id}/review",
    params(("id" = String, Path, description = "Edit request id")),
    request_body = ReviewEditRequest,
    responses(
        (status = 200, description = "Reviewed request", body = EditRequest),
        (status = 400, description = "Not pending or bad unlock window", body = ErrorResponse),
        (status = 404, description = "No such request", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state, user, review), fields(admin = %user.user_id))]
pub async fn review_request(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(review): Json<ReviewEditRequest>,
) -> ApiResult<Json<EditRequest>> {
    Ok(Json(state.services.exam_sessions.handle_request(&id, review, &user.user_id).await?))
}

/// End an approved unlock early
#[utoipa::path(
    post,
    path = "/api/admin/edit-requests/{id}/revoke",
    params(("id" = String, Path, description = "Edit request id")),
    responses(
        (status = 200, description = "Revoked request", body = EditRequest),
        (status = 400, description = "No active unlock", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "edit-requests"
)]
#[instrument(skip(state, user), fields(admin = %user.user_id))]
pub async fn revoke_request(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> ApiResult<Json<EditRequest>> {
    Ok(Json(state.services.exam_sessions.revoke_request(&id, &user.user_id).await?))
}
