use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::{info, instrument};

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::backup::{
    Backup, BackupStats, BackupType, CleanupOutcome, CreateBackupRequest, RestoreOutcome, VerifyOutcome,
};
use school_health_domain::errors::ServiceError;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};

/// Snapshot the database now; body is optional
#[utoipa::path(
    post,
    path = "/api/admin/backups",
    request_body(content = Option<CreateBackupRequest>),
    responses(
        (status = 201, description = "Backup completed", body = Backup),
        (status = 400, description = "Invalid retention", body = ErrorResponse),
        (status = 500, description = "Backup failed", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state, user, request), fields(admin = %user.user_id))]
pub async fn create_backup(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    request: Option<Json<CreateBackupRequest>>,
) -> ApiResult<(StatusCode, Json<Backup>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let backup = state.services.backups.create(request, &user.user_id, BackupType::Manual).await?;
    Ok((StatusCode::CREATED, Json(backup)))
}

/// Backups, newest first
#[utoipa::path(
    get,
    path = "/api/admin/backups",
    responses((status = 200, description = "Backups", body = Vec<Backup>)),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn list_backups(State(state): State<AppState>) -> ApiResult<Json<Vec<Backup>>> {
    Ok(Json(state.services.backups.list().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/backups/stats",
    responses((status = 200, description = "Backup statistics", body = BackupStats)),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn backup_stats(State(state): State<AppState>) -> ApiResult<Json<BackupStats>> {
    Ok(Json(state.services.backups.stats().await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/backups/{id}",
    params(("id" = String, Path, description = "Backup id")),
    responses(
        (status = 200, description = "Backup", body = Backup),
        (status = 404, description = "No such backup", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn backup_details(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Backup>> {
    Ok(Json(state.services.backups.details(&id).await?))
}

/// The backup's zip archive
#[utoipa::path(
    get,
    path = "/api/admin/backups/{id}/download",
    params(("id" = String, Path, description = "Backup id")),
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip", body = Vec<u8>),
        (status = 404, description = "No archive", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn download_backup(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let path = state.services.backups.download_path(&id).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to read backup archive: {}", e)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.zip", id));

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// Recompute the archive checksum
#[utoipa::path(
    post,
    path = "/api/admin/backups/{id}/verify",
    params(("id" = String, Path, description = "Backup id")),
    responses(
        (status = 200, description = "Verification result", body = VerifyOutcome),
        (status = 404, description = "No such backup", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn verify_backup(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<VerifyOutcome>> {
    Ok(Json(state.services.backups.verify(&id).await?))
}

/// Replace application data with the backup's snapshot
#[utoipa::path(
    post,
    path = "/api/admin/backups/{id}/restore",
    params(("id" = String, Path, description = "Backup id")),
    responses(
        (status = 200, description = "Restore result", body = RestoreOutcome),
        (status = 400, description = "Archive failed verification", body = ErrorResponse),
        (status = 404, description = "No such backup", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state, user), fields(admin = %user.user_id))]
pub async fn restore_backup(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> ApiResult<Json<RestoreOutcome>> {
    let outcome = state.services.backups.restore(&id).await?;
    info!("Admin {} restored backup {} ({} rows)", user.user_id, id, outcome.rows_restored);
    Ok(Json(outcome))
}

#[utoipa::path(
    delete,
    path = "/api/admin/backups/{id}",
    params(("id" = String, Path, description = "Backup id")),
    responses(
        (status = 200, description = "Backup deleted", body = MessageResponse),
        (status = 404, description = "No such backup", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn delete_backup(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.backups.delete(&id).await?;
    Ok(Json(MessageResponse::new("Backup deleted")))
}

/// Delete backups past their retention
#[utoipa::path(
    post,
    path = "/api/admin/backups/cleanup",
    responses((status = 200, description = "Cleanup result", body = CleanupOutcome)),
    security(("bearer" = [])),
    tag = "backups"
)]
#[instrument(skip(state))]
pub async fn cleanup_backups(State(state): State<AppState>) -> ApiResult<Json<CleanupOutcome>> {
    Ok(Json(state.services.backups.cleanup().await?))
}
