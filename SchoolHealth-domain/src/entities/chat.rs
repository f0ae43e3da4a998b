use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SendMessageRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub content: String,
}

/// A conversation as seen by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ConversationSummary {
    pub id: String,
    pub other_participant: String,
    pub last_message: Option<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Someone the caller may start a chat with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub role: String,
    pub online: bool,
}

/// Event pushed to connected clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage { message: Message },
    UserOnline { user_id: String },
    UserOffline { user_id: String },
}

impl ChatEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::NewMessage { .. } => "new_message",
            ChatEvent::UserOnline { .. } => "user_online",
            ChatEvent::UserOffline { .. } => "user_offline",
        }
    }

    /// Whether `user_id` should receive this event
    pub fn is_for(&self, user_id: &str) -> bool {
        match self {
            ChatEvent::NewMessage { message } => message.receiver_id == user_id || message.sender_id == user_id,
            ChatEvent::UserOnline { .. } | ChatEvent::UserOffline { .. } => true,
        }
    }
}
