use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::{info, instrument};

use school_health_domain::auth::{clear_cookie, login_cookie, Claims, LoginRequest, LoginResponse};
use school_health_domain::entities::RegisterRequest;

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};

/// Login body plus the role cookie
fn with_cookie(status: StatusCode, login: LoginResponse) -> Response {
    let cookie = login_cookie(login.user.role, &login.access_token, login.expires_in);
    (status, [(header::SET_COOKIE, cookie)], Json(login)).into_response()
}

/// Admin login with the configured credentials
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; also sets the aToken cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn admin_login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let login = state.services.auth.admin_login(&request).await?;
    Ok(with_cookie(StatusCode::OK, login))
}

/// Doctor login
#[utoipa::path(
    post,
    path = "/api/doctor/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; also sets the dToken cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn doctor_login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let login = state.services.auth.doctor_login(&request).await?;
    Ok(with_cookie(StatusCode::OK, login))
}

/// Student or user login
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; also sets the token cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn user_login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<Response> {
    let login = state.services.auth.user_login(&request).await?;
    Ok(with_cookie(StatusCode::OK, login))
}

/// Self-service registration
#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = LoginResponse),
        (status = 400, description = "Invalid registration", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> ApiResult<Response> {
    let login = state.services.auth.register(request).await?;
    Ok(with_cookie(StatusCode::CREATED, login))
}

/// Revoke the caller's token and clear their cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip(state, claims), fields(user = %claims.sub))]
pub async fn logout(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> Response {
    state.services.auth.logout(&claims);
    info!("User {} logged out", claims.sub);
    (
        [(header::SET_COOKIE, clear_cookie(claims.role))],
        Json(MessageResponse::new("Logged out")),
    )
        .into_response()
}
