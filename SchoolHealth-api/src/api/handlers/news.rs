use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use tracing::instrument;

use school_health_domain::entities::news::{News, NewsRequest};

use crate::api::error::{ApiError, ApiResult};
use crate::api::uploads::{store_optional, MultipartForm};
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, MessageResponse};
use crate::entities::forms::NewsForm;

/// The attachment is an uploaded file or, failing that, a `file` text field
async fn news_request(state: &AppState, multipart: Multipart) -> ApiResult<NewsRequest> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = match store_optional(&mut form, "file", &state.upload_dir).await? {
        Some(url) => url,
        None => form.text_or_empty("file"),
    };

    Ok(NewsRequest {
        title: form.text_or_empty("title"),
        category: form.text_or_empty("category"),
        date: form
            .parse::<NaiveDate>("date")?
            .ok_or_else(|| ApiError::BadRequest("date: Date is required".to_string()))?,
        content: form.text_or_empty("content"),
        file,
    })
}

#[utoipa::path(
    post,
    path = "/api/admin/news",
    request_body(content = NewsForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "News published", body = News),
        (status = 400, description = "Invalid news", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "news"
)]
#[instrument(skip(state, multipart))]
pub async fn add_news(State(state): State<AppState>, multipart: Multipart) -> ApiResult<(StatusCode, Json<News>)> {
    let request = news_request(&state, multipart).await?;
    let news = state.services.news.add_news(request).await?;
    Ok((StatusCode::CREATED, Json(news)))
}

/// News, newest date first
#[utoipa::path(
    get,
    path = "/api/admin/news",
    responses((status = 200, description = "News", body = Vec<News>)),
    security(("bearer" = [])),
    tag = "news"
)]
#[instrument(skip(state))]
pub async fn list_news(State(state): State<AppState>) -> ApiResult<Json<Vec<News>>> {
    Ok(Json(state.services.news.list_news().await?))
}

/// Announcements for any signed-in user
#[utoipa::path(
    get,
    path = "/api/user/announcements",
    responses((status = 200, description = "News", body = Vec<News>)),
    security(("bearer" = [])),
    tag = "news"
)]
#[instrument(skip(state))]
pub async fn announcements(State(state): State<AppState>) -> ApiResult<Json<Vec<News>>> {
    Ok(Json(state.services.news.list_news().await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/news/{id}",
    params(("id" = String, Path, description = "News id")),
    request_body(content = NewsForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated news", body = News),
        (status = 404, description = "No such news", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "news"
)]
#[instrument(skip(state, multipart))]
pub async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<News>> {
    let request = news_request(&state, multipart).await?;
    Ok(Json(state.services.news.update_news(&id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/news/{id}",
    params(("id" = String, Path, description = "News id")),
    responses(
        (status = 200, description = "News deleted", body = MessageResponse),
        (status = 404, description = "No such news", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "news"
)]
#[instrument(skip(state))]
pub async fn delete_news(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    state.services.news.delete_news(&id).await?;
    Ok(Json(MessageResponse::new("News deleted")))
}
