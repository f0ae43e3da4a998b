//! Two-party chat with a realtime event hub
//!
//! Messages are stored through the message repository. Every stored
//! message is also published on a [`ChatHub`], whose subscribers (one per
//! open event stream) filter the events addressed to them.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, info};
use validator::Validate;

use school_health_data::models::{AccountFilter, MessageRecord};
use school_health_data::repository::{AccountRepositoryTrait, DoctorRepositoryTrait, MessageRepositoryTrait};

use crate::auth::Role;
use crate::entities::account::AccountRole;
use crate::entities::chat::{ChatEvent, ChatUser, ConversationSummary, Message, SendMessageRequest};
use crate::entities::conversions;
use crate::errors::{invalid, ServiceError};

const EVENT_BUFFER: usize = 256;

/// Broadcast hub for chat events plus the set of connected users
pub struct ChatHub {
    sender: broadcast::Sender<ChatEvent>,
    online: Mutex<HashMap<String, usize>>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender, online: Mutex::new(HashMap::new()) }
    }

    /// Publish an event; having no subscribers is fine
    pub fn publish(&self, event: ChatEvent) {
        debug!("Publishing chat event {}", event.name());
        let _ = self.sender.send(event);
    }

    /// Open a connection for `user_id`.
    ///
    /// The user counts as online until every connection they opened is dropped.
    pub fn connect(self: &Arc<Self>, user_id: &str) -> ChatConnection {
        let receiver = self.sender.subscribe();
        let first = {
            let mut online = self.online.lock().unwrap_or_else(|p| p.into_inner());
            let count = online.entry(user_id.to_string()).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first {
            self.publish(ChatEvent::UserOnline { user_id: user_id.to_string() });
        }

        ChatConnection { hub: Arc::clone(self), user_id: user_id.to_string(), receiver }
    }

    fn disconnect(&self, user_id: &str) {
        let last = {
            let mut online = self.online.lock().unwrap_or_else(|p| p.into_inner());
            match online.get_mut(user_id) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    online.remove(user_id);
                    true
                }
                None => false,
            }
        };
        if last {
            self.publish(ChatEvent::UserOffline { user_id: user_id.to_string() });
        }
    }

    /// Ids of connected users, sorted
    pub fn online_users(&self) -> Vec<String> {
        let online = self.online.lock().unwrap_or_else(|p| p.into_inner());
        online.keys().cloned().collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.lock().unwrap_or_else(|p| p.into_inner()).contains_key(user_id)
    }
}

/// A user's live subscription; dropping it marks the connection closed
pub struct ChatConnection {
    hub: Arc<ChatHub>,
    user_id: String,
    receiver: broadcast::Receiver<ChatEvent>,
}

impl ChatConnection {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next event addressed to this user; `None` once the hub is gone
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.is_for(&self.user_id) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Chat stream for {} skipped {} events", self.user_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        self.hub.disconnect(&self.user_id);
    }
}

pub struct ChatService {
    messages: Arc<dyn MessageRepositoryTrait + Send + Sync>,
    accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
    doctors: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
    hub: Arc<ChatHub>,
}

impl ChatService {
    pub fn new(
        messages: Arc<dyn MessageRepositoryTrait + Send + Sync>,
        accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
        doctors: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
        hub: Arc<ChatHub>,
    ) -> Self {
        Self { messages, accounts, doctors, hub }
    }

    pub fn hub(&self) -> &Arc<ChatHub> {
        &self.hub
    }

    /// Store a message, creating the conversation when needed, and publish it
    pub async fn send(&self, sender_id: &str, receiver_id: &str, request: SendMessageRequest) -> Result<Message, ServiceError> {
        request.validate()?;
        if request.content.trim().is_empty() {
            return Err(invalid("content: Message cannot be blank"));
        }
        if sender_id == receiver_id {
            return Err(invalid("Cannot send a message to yourself"));
        }

        let record = MessageRecord::new(sender_id, receiver_id, &request.content);
        self.messages.append(&record).await?;
        info!("Message {} from {} to {}", record.id, sender_id, receiver_id);

        let message = conversions::convert_to_domain_message(record);
        self.hub.publish(ChatEvent::NewMessage { message: message.clone() });
        Ok(message)
    }

    /// Messages between two users in chronological order
    pub async fn messages(&self, me: &str, other: &str) -> Result<Vec<Message>, ServiceError> {
        let Some(conversation) = self.messages.find_conversation(me, other).await? else {
            return Ok(Vec::new());
        };

        Ok(self
            .messages
            .messages(&conversation.id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_message)
            .collect())
    }

    /// The caller's conversations, most recently updated first
    pub async fn conversations(&self, me: &str) -> Result<Vec<ConversationSummary>, ServiceError> {
        Ok(self
            .messages
            .conversations_for(me)
            .await?
            .into_iter()
            .map(|(conversation, last)| ConversationSummary {
                other_participant: if conversation.participant_a == me {
                    conversation.participant_b
                } else {
                    conversation.participant_a
                },
                id: conversation.id,
                last_message: last.map(conversions::convert_to_domain_message),
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
            })
            .collect())
    }

    /// People the caller can chat with: doctors see students, everyone else sees doctors
    pub async fn chat_users(&self, role: Role) -> Result<Vec<ChatUser>, ServiceError> {
        let mut users = Vec::new();

        if matches!(role, Role::Doctor | Role::Admin) {
            let filter = AccountFilter { role: Some(AccountRole::Student.as_str().to_string()), ..Default::default() };
            for account in self.accounts.list(&filter).await? {
                users.push(ChatUser {
                    online: self.hub.is_online(&account.id),
                    id: account.id,
                    name: account.name,
                    image: account.image,
                    role: Role::Student.as_str().to_string(),
                });
            }
        }

        if role != Role::Doctor {
            for doctor in self.doctors.list(false).await? {
                users.push(ChatUser {
                    online: self.hub.is_online(&doctor.id),
                    id: doctor.id,
                    name: doctor.name,
                    image: doctor.image,
                    role: Role::Doctor.as_str().to_string(),
                });
            }
        }

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::{AccountRepository, DoctorRepository, MessageRepository};

    fn service() -> ChatService {
        let pool = create_in_memory_pool().unwrap();
        ChatService::new(
            Arc::new(MessageRepository::new(pool.clone())),
            Arc::new(AccountRepository::new(pool.clone())),
            Arc::new(DoctorRepository::new(pool)),
            Arc::new(ChatHub::new()),
        )
    }

    fn text(content: &str) -> SendMessageRequest {
        SendMessageRequest { content: content.to_string() }
    }

    #[tokio::test]
    async fn test_send_creates_conversation_and_orders_messages() {
        let service = service();
        assert!(service.messages("a", "b").await.unwrap().is_empty());

        service.send("a", "b", text("hello")).await.unwrap();
        service.send("b", "a", text("hi there")).await.unwrap();

        let messages = service.messages("b", "a").await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi there"]);

        let conversations = service.conversations("a").await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].other_participant, "b");
        assert_eq!(conversations[0].last_message.as_ref().unwrap().content, "hi there");
    }

    #[tokio::test]
    async fn test_message_length_limits() {
        let service = service();
        assert!(matches!(service.send("a", "b", text("")).await, Err(ServiceError::Validation(_))));
        assert!(matches!(service.send("a", "b", text(&"x".repeat(2001))).await, Err(ServiceError::Validation(_))));
        assert!(service.send("a", "b", text(&"x".repeat(2000))).await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_receives_only_own_messages() {
        let service = service();
        let hub = service.hub().clone();

        let mut bob = hub.connect("b");
        assert_eq!(hub.online_users(), vec!["b".to_string()]);

        service.send("a", "c", text("not for bob")).await.unwrap();
        service.send("a", "b", text("for bob")).await.unwrap();

        match bob.next_event().await {
            Some(ChatEvent::UserOnline { user_id }) => assert_eq!(user_id, "b"),
            other => panic!("unexpected event: {:?}", other),
        }
        match bob.next_event().await {
            Some(ChatEvent::NewMessage { message }) => assert_eq!(message.content, "for bob"),
            other => panic!("unexpected event: {:?}", other),
        }

        drop(bob);
        assert!(hub.online_users().is_empty());
    }
}
