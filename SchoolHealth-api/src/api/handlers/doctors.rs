use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::{Address, CreateDoctorRequest, Doctor, UpdateDoctorProfileRequest};

use crate::api::error::ApiResult;
use crate::api::uploads::{store_optional, MultipartForm};
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};
use crate::entities::forms::DoctorForm;

/// Create a doctor account from a multipart form
#[utoipa::path(
    post,
    path = "/api/admin/doctors",
    request_body(content = DoctorForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Doctor created", body = Doctor),
        (status = 400, description = "Invalid doctor", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state, multipart))]
pub async fn add_doctor(State(state): State<AppState>, multipart: Multipart) -> ApiResult<(StatusCode, Json<Doctor>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = store_optional(&mut form, "image", &state.upload_dir).await?;

    let request = CreateDoctorRequest {
        name: form.text_or_empty("name"),
        email: form.text_or_empty("email"),
        password: form.text_or_empty("password"),
        speciality: form.text_or_empty("speciality"),
        degree: form.text_or_empty("degree"),
        experience: form.text_or_empty("experience"),
        about: form.text_or_empty("about"),
        fees: form.parse::<f64>("fees")?.unwrap_or_default(),
        address: form.json::<Address>("address")?.unwrap_or_default(),
        image,
    };

    let doctor = state.services.doctors.add_doctor(request).await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

/// Every doctor, available or not
#[utoipa::path(
    get,
    path = "/api/admin/doctors",
    responses((status = 200, description = "All doctors", body = Vec<Doctor>)),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn all_doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<Doctor>>> {
    Ok(Json(state.services.doctors.list_doctors(false).await?))
}

/// Public list of available doctors
#[utoipa::path(
    get,
    path = "/api/doctor/list",
    responses((status = 200, description = "Available doctors", body = Vec<Doctor>)),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn doctor_list(State(state): State<AppState>) -> ApiResult<Json<Vec<Doctor>>> {
    Ok(Json(state.services.doctors.list_doctors(true).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/doctors/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Doctor deleted", body = MessageResponse),
        (status = 404, description = "No such doctor", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn delete_doctor(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.doctors.delete_doctor(&id).await?;
    Ok(Json(MessageResponse::new("Doctor deleted")))
}

/// Flip a doctor's availability
#[utoipa::path(
    post,
    path = "/api/admin/doctors/{id}/availability",
    params(("id" = String, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Updated doctor", body = Doctor),
        (status = 404, description = "No such doctor", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn change_availability(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Doctor>> {
    Ok(Json(state.services.doctors.toggle_availability(&id).await?))
}

/// Flip the calling doctor's own availability
#[utoipa::path(
    post,
    path = "/api/doctor/availability",
    responses((status = 200, description = "Updated doctor", body = Doctor)),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state, user), fields(doctor = %user.user_id))]
pub async fn own_availability(State(state): State<AppState>, Extension(user): Extension<UserInfo>) -> ApiResult<Json<Doctor>> {
    Ok(Json(state.services.doctors.toggle_availability(&user.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/profile",
    responses((status = 200, description = "Doctor profile", body = Doctor)),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state, user), fields(doctor = %user.user_id))]
pub async fn doctor_profile(State(state): State<AppState>, Extension(user): Extension<UserInfo>) -> ApiResult<Json<Doctor>> {
    Ok(Json(state.services.doctors.profile(&user.user_id).await?))
}

/// Update fees, address, availability or about
#[utoipa::path(
    put,
    path = "/api/doctor/profile",
    request_body = UpdateDoctorProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Doctor),
        (status = 400, description = "Invalid profile", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "doctors"
)]
#[instrument(skip(state, user, request), fields(doctor = %user.user_id))]
pub async fn update_doctor_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> ApiResult<Json<Doctor>> {
    Ok(Json(state.services.doctors.update_profile(&user.user_id, request).await?))
}
