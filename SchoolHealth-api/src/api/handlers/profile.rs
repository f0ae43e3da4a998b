use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use tracing::instrument;

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::{Address, ChangePasswordRequest, Student, UpdateProfileRequest};

use crate::api::error::ApiResult;
use crate::api::uploads::{store_optional, MultipartForm};
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};
use crate::entities::forms::ProfileForm;

/// The caller's own account
#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile", body = Student),
        (status = 404, description = "No account for this token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn get_profile(State(state): State<AppState>, Extension(user): Extension<UserInfo>) -> ApiResult<Json<Student>> {
    Ok(Json(state.services.accounts.profile(&user.user_id).await?))
}

/// Update the caller's profile; omitted fields are unchanged
#[utoipa::path(
    put,
    path = "/api/user/profile",
    request_body(content = ProfileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated profile", body = Student),
        (status = 400, description = "Invalid profile", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
#[instrument(skip(state, user, multipart), fields(user = %user.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    multipart: Multipart,
) -> ApiResult<Json<Student>> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = store_optional(&mut form, "image", &state.upload_dir).await?;

    let request = UpdateProfileRequest {
        name: form.text("name"),
        phone: form.text("phone"),
        address: form.json::<Address>("address")?,
        dob: form.text("dob"),
        gender: form.text("gender"),
        about: form.text("about"),
        image,
    };

    Ok(Json(state.services.accounts.update_profile(&user.user_id, request).await?))
}

#[utoipa::path(
    post,
    path = "/api/user/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new one", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
#[instrument(skip(state, user, request), fields(user = %user.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.services.accounts.change_password(&user.user_id, request).await?;
    Ok(Json(MessageResponse::new("Password changed")))
}
