use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use school_health_domain::health::{self, Check, Status};

use crate::api::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, `degraded` or `error`
    pub status: String,
    pub version: String,
    /// Unix seconds
    pub timestamp: u64,
    /// Seconds since startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    pub components: ComponentStatus,
    pub environment: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub database: ComponentHealthStatus,
    pub api: ComponentHealthStatus,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ComponentHealthStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

static STARTED_AT: OnceCell<u64> = OnceCell::new();

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Remember when the server came up; only the first call counts
pub fn initialize_server_start_time() {
    let _ = STARTED_AT.set(unix_now());
}

fn label(status: Status) -> &'static str {
    match status {
        Status::Healthy => "ok",
        Status::Degraded => "degraded",
        Status::Unhealthy => "error",
    }
}

fn http_status(status: Status) -> StatusCode {
    match status {
        Status::Healthy => StatusCode::OK,
        Status::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        Status::Unhealthy => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn component(check: Option<&Check>) -> ComponentHealthStatus {
    match check {
        Some(check) => ComponentHealthStatus { status: label(check.status).to_string(), message: check.details.clone() },
        None => ComponentHealthStatus { status: label(Status::Healthy).to_string(), message: None },
    }
}

/// Service and database status
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Everything is up", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = HealthResponse),
        (status = 503, description = "Running on the in-memory fallback", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = health::system_health(&state.pool).await;
    debug!(status = label(report.status), "health check");

    let now = unix_now();
    let body = HealthResponse {
        status: label(report.status).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime: STARTED_AT.get().map(|started| now.saturating_sub(*started)),
        components: ComponentStatus { database: component(report.check("database")), api: component(report.check("api")) },
        environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
    };

    (http_status(report.status), Json(body))
}
