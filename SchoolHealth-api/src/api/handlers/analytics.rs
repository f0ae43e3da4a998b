use axum::{extract::State, Json};
use tracing::instrument;

use school_health_domain::entities::analytics::{Dashboard, HealthAnalytics};

use crate::api::error::ApiResult;
use crate::api::AppState;

/// Counters plus the latest abnormalities
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses((status = 200, description = "Dashboard", body = Dashboard)),
    security(("bearer" = [])),
    tag = "analytics"
)]
#[instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<Dashboard>> {
    Ok(Json(state.services.analytics.dashboard().await?))
}

/// BMI distribution, monthly trends, top symptoms and per-cohort health
#[utoipa::path(
    get,
    path = "/api/admin/analytics",
    responses((status = 200, description = "Health analytics", body = HealthAnalytics)),
    security(("bearer" = [])),
    tag = "analytics"
)]
#[instrument(skip(state))]
pub async fn health_analytics(State(state): State<AppState>) -> ApiResult<Json<HealthAnalytics>> {
    Ok(Json(state.services.analytics.health_analytics().await?))
}
