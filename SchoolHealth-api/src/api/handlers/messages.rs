use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::{self, Stream};
use tracing::{debug, instrument};

use school_health_domain::auth::UserInfo;
use school_health_domain::entities::chat::{ChatUser, ConversationSummary, Message, SendMessageRequest};

use crate::api::error::ApiResult;
use crate::api::AppState;
use crate::entities::common::{ErrorResponse, OnlineUsers};

/// Send a message to another user
#[utoipa::path(
    post,
    path = "/api/messages/send/{id}",
    params(("id" = String, Path, description = "Receiver id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and pushed", body = Message),
        (status = 400, description = "Empty, oversized or self-addressed message", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "messages"
)]
#[instrument(skip(state, user, request), fields(sender = %user.user_id))]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(receiver_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = state.services.chat.send(&user.user_id, &receiver_id, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Conversation with one user, oldest first
#[utoipa::path(
    get,
    path = "/api/messages/{id}",
    params(("id" = String, Path, description = "Other participant's id")),
    responses((status = 200, description = "Messages", body = Vec<Message>)),
    security(("bearer" = [])),
    tag = "messages"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(other_id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.services.chat.messages(&user.user_id, &other_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    responses((status = 200, description = "Conversations, most recent first", body = Vec<ConversationSummary>)),
    security(("bearer" = [])),
    tag = "messages"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn conversations(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.services.chat.conversations(&user.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/messages/online",
    responses((status = 200, description = "Users with an open event stream", body = OnlineUsers)),
    security(("bearer" = [])),
    tag = "messages"
)]
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsers> {
    Json(OnlineUsers { users: state.services.chat.hub().online_users() })
}

/// Server-sent events: `new_message`, `user_online` and `user_offline`.
///
/// The caller counts as online while the stream is open.
#[utoipa::path(
    get,
    path = "/api/messages/events",
    responses((status = 200, description = "Event stream", content_type = "text/event-stream", body = String)),
    security(("bearer" = [])),
    tag = "messages"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn events(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Opening chat stream");
    let connection = state.services.chat.hub().connect(&user.user_id);

    let stream = stream::unfold(connection, |mut connection| async move {
        loop {
            let event = connection.next_event().await?;
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => return Some((Ok(sse), connection)),
                Err(e) => debug!("Dropping unserializable chat event: {}", e),
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// People the caller may chat with
#[utoipa::path(
    get,
    path = "/api/user/chat-users",
    responses((status = 200, description = "Chat partners", body = Vec<ChatUser>)),
    security(("bearer" = [])),
    tag = "messages"
)]
#[instrument(skip(state, user), fields(user = %user.user_id))]
pub async fn chat_users(State(state): State<AppState>, Extension(user): Extension<UserInfo>) -> ApiResult<Json<Vec<ChatUser>>> {
    Ok(Json(state.services.chat.chat_users(user.role).await?))
}
