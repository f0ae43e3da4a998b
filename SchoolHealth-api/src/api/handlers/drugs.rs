use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use tracing::{info, instrument};

use school_health_domain::entities::drug::{Drug, DrugAlerts, DrugImportSummary, DrugRequest};

use crate::api::error::{ApiError, ApiResult};
use crate::api::uploads::{store_optional, MultipartForm};
use crate::api::AppState;
use crate::entities::common::{AlertQuery, ErrorResponse, MessageResponse};
use crate::entities::forms::{DrugForm, ImportForm};

async fn drug_request(state: &AppState, multipart: Multipart) -> ApiResult<DrugRequest> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = store_optional(&mut form, "image", &state.upload_dir).await?;

    Ok(DrugRequest {
        name: form.text_or_empty("name"),
        code: form.text_or_empty("code"),
        drug_type: form.text_or_empty("drug_type"),
        unit: form.text_or_empty("unit"),
        inventory_quantity: form.parse::<i64>("inventory_quantity")?.unwrap_or_default(),
        expiry_date: form
            .parse::<NaiveDate>("expiry_date")?
            .ok_or_else(|| ApiError::BadRequest("expiry_date: Expiry date is required".to_string()))?,
        supplier_name: form.text_or_empty("supplier_name"),
        notes: form.text_or_empty("notes"),
        image,
    })
}

#[utoipa::path(
    post,
    path = "/api/doctor/drugs",
    request_body(content = DrugForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Drug added", body = Drug),
        (status = 400, description = "Invalid drug", body = ErrorResponse),
        (status = 409, description = "Drug code already in use", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state, multipart))]
pub async fn add_drug(State(state): State<AppState>, multipart: Multipart) -> ApiResult<(StatusCode, Json<Drug>)> {
    let request = drug_request(&state, multipart).await?;
    let drug = state.services.drugs.add_drug(request).await?;
    Ok((StatusCode::CREATED, Json(drug)))
}

#[utoipa::path(
    get,
    path = "/api/doctor/drugs",
    responses((status = 200, description = "Drug inventory", body = Vec<Drug>)),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state))]
pub async fn list_drugs(State(state): State<AppState>) -> ApiResult<Json<Vec<Drug>>> {
    Ok(Json(state.services.drugs.list_drugs().await?))
}

/// Replace a drug; the image is kept unless a new one is uploaded
#[utoipa::path(
    put,
    path = "/api/doctor/drugs/{id}",
    params(("id" = String, Path, description = "Drug id")),
    request_body(content = DrugForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated drug", body = Drug),
        (status = 400, description = "Invalid drug", body = ErrorResponse),
        (status = 404, description = "No such drug", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state, multipart))]
pub async fn update_drug(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<Drug>> {
    let request = drug_request(&state, multipart).await?;
    Ok(Json(state.services.drugs.update_drug(&id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/drugs/{id}",
    params(("id" = String, Path, description = "Drug id")),
    responses(
        (status = 200, description = "Drug deleted", body = MessageResponse),
        (status = 404, description = "No such drug", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state))]
pub async fn delete_drug(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.drugs.delete_drug(&id).await?;
    Ok(Json(MessageResponse::new("Drug deleted")))
}

/// Bulk drug import from .xlsx or .csv; all rows or none
#[utoipa::path(
    post,
    path = "/api/doctor/drugs/import",
    request_body(content = ImportForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Import summary", body = DrugImportSummary),
        (status = 400, description = "Unreadable file or invalid rows", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state, multipart))]
pub async fn import_drugs(State(state): State<AppState>, multipart: Multipart) -> ApiResult<(StatusCode, Json<DrugImportSummary>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::BadRequest("file: A spreadsheet is required".to_string()))?;

    let summary = state.services.drugs.import(&file.file_name, &file.bytes).await?;
    info!("Imported {} drugs", summary.inserted_count);
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Low-stock and expiring drugs
#[utoipa::path(
    get,
    path = "/api/doctor/drugs/alerts",
    params(AlertQuery),
    responses((status = 200, description = "Drug alerts", body = DrugAlerts)),
    security(("bearer" = [])),
    tag = "drugs"
)]
#[instrument(skip(state))]
pub async fn drug_alerts(State(state): State<AppState>, Query(query): Query<AlertQuery>) -> ApiResult<Json<DrugAlerts>> {
    Ok(Json(state.services.drugs.alerts(query.threshold, query.days).await?))
}
