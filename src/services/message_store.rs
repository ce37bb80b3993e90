use super::ChatError;
use crate::db::ChatRepository;
use crate::models::{Message, MessageType};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Clone)]
pub struct MessageStore {
    repo: Arc<dyn ChatRepository>,
}

impl MessageStore {
    pub fn new(repo: Arc<dyn ChatRepository>) -> Self {
        Self { repo }
    }

    /// Persists a message and advances the conversation's last-message
    /// pointer as one unit. Fails with `ConversationNotFound` without writing.
    #[tracing::instrument(name = "Append message.", skip(self, content))]
    pub async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation("message content must not be empty".to_string()));
        }

        let message = Message::new(conversation_id, sender_id, content, message_type);
        let stored = self.repo.append_message(message).await?;
        tracing::debug!(message_id = %stored.id, "Message appended");

        Ok(stored)
    }

    pub async fn fetch(&self, message_id: Uuid) -> Result<Option<Message>, ChatError> {
        Ok(self.repo.fetch_message(message_id).await?)
    }

    /// Page of history, oldest first. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
        before: Option<Uuid>,
    ) -> Result<Vec<Message>, ChatError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self.repo.messages(conversation_id, limit, before).await?)
    }
}
