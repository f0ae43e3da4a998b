use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};
use tracing::debug;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::support::optional;
use crate::database::DatabasePool;
use crate::models::{ConversationRecord, MessageRecord};

/// Repository trait for two-party conversations and their messages
#[async_trait]
pub trait MessageRepositoryTrait {
    /// Find the conversation between two participants, in either order
    async fn find_conversation(&self, a: &str, b: &str) -> Result<Option<ConversationRecord>, RepositoryError>;

    /// Store a message, creating the conversation first when needed
    async fn append(&self, message: &MessageRecord) -> Result<ConversationRecord, RepositoryError>;

    /// Messages of a conversation in chronological order
    async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, RepositoryError>;

    /// Conversations a participant belongs to, most recently updated first,
    /// each with its last message
    async fn conversations_for(
        &self,
        participant: &str,
    ) -> Result<Vec<(ConversationRecord, Option<MessageRecord>)>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: DatabasePool,
}

impl MessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Participants are stored sorted so each pair has one row
fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

const CONVERSATION_COLUMNS: &str =
    "SELECT id, participant_a, participant_b, created_at, updated_at FROM conversations";

const MESSAGE_COLUMNS: &str =
    "SELECT id, conversation_id, sender_id, receiver_id, content, created_at FROM messages";

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[async_trait]
impl MessageRepositoryTrait for MessageRepository {
    async fn find_conversation(&self, a: &str, b: &str) -> Result<Option<ConversationRecord>, RepositoryError> {
        let (first, second) = ordered(a, b);
        let conn = self.pool.conn()?;
        optional(conn.query_row(
            &format!("{} WHERE participant_a = ?1 AND participant_b = ?2", CONVERSATION_COLUMNS),
            [first, second],
            map_conversation,
        ))
    }

    async fn append(&self, message: &MessageRecord) -> Result<ConversationRecord, RepositoryError> {
        let (first, second) = ordered(&message.sender_id, &message.receiver_id);
        let mut conn = self.pool.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations (id, participant_a, participant_b, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (participant_a, participant_b) DO UPDATE SET updated_at = excluded.updated_at",
            params![Uuid::new_v4().to_string(), first, second, message.created_at],
        )?;
        let conversation = tx.query_row(
            &format!("{} WHERE participant_a = ?1 AND participant_b = ?2", CONVERSATION_COLUMNS),
            [first, second],
            map_conversation,
        )?;

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                conversation.id,
                message.sender_id,
                message.receiver_id,
                message.content,
                message.created_at,
            ],
        )?;
        tx.commit()?;

        debug!("Stored message {} in conversation {}", message.id, conversation.id);
        Ok(conversation)
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE conversation_id = ?1 ORDER BY created_at, rowid",
            MESSAGE_COLUMNS
        ))?;
        let messages = stmt
            .query_map([conversation_id], map_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    async fn conversations_for(
        &self,
        participant: &str,
    ) -> Result<Vec<(ConversationRecord, Option<MessageRecord>)>, RepositoryError> {
        let conn = self.pool.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE participant_a = ?1 OR participant_b = ?1 ORDER BY updated_at DESC",
            CONVERSATION_COLUMNS
        ))?;
        let conversations = stmt
            .query_map([participant], map_conversation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut last_stmt = conn.prepare(&format!(
            "{} WHERE conversation_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
            MESSAGE_COLUMNS
        ))?;
        let mut result = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let last = optional(last_stmt.query_row([&conversation.id], map_message))?;
            result.push((conversation, last));
        }
        Ok(result)
    }
}

impl MessageRecord {
    /// Build a new message stamped with the current time
    pub fn new(sender_id: &str, receiver_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: String::new(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_in_memory_pool;

    #[tokio::test]
    async fn test_append_reuses_conversation_for_either_direction() {
        let repo = MessageRepository::new(create_in_memory_pool().unwrap());

        let first = repo.append(&MessageRecord::new("doc-1", "stu-1", "hello")).await.unwrap();
        let second = repo.append(&MessageRecord::new("stu-1", "doc-1", "hi doctor")).await.unwrap();
        assert_eq!(first.id, second.id);

        let found = repo.find_conversation("stu-1", "doc-1").await.unwrap().unwrap();
        let messages = repo.messages(&found.id).await.unwrap();
        assert_eq!(
            messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["hello", "hi doctor"]
        );
    }

    #[tokio::test]
    async fn test_conversations_include_last_message() {
        let repo = MessageRepository::new(create_in_memory_pool().unwrap());
        repo.append(&MessageRecord::new("doc-1", "stu-1", "one")).await.unwrap();
        repo.append(&MessageRecord::new("doc-1", "stu-2", "two")).await.unwrap();
        repo.append(&MessageRecord::new("stu-1", "doc-1", "three")).await.unwrap();

        let conversations = repo.conversations_for("doc-1").await.unwrap();
        assert_eq!(conversations.len(), 2);
        let last = conversations[0].1.as_ref().unwrap();
        assert_eq!(last.content, "three");

        assert!(repo.conversations_for("nobody").await.unwrap().is_empty());
    }
}
