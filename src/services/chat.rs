use super::{ChatError, ConversationRegistry, MessageStore, ReadReceipt, ReadReceiptManager};
use crate::db::ChatRepository;
use crate::models::{Message, MessageType};
use crate::realtime::{EventPublisher, PresenceDirectory, ServerEvent};
use crate::views;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Where a message goes: an existing conversation, or the private
/// conversation with `Recipient`, created on first contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    Conversation(Uuid),
    Recipient(Uuid),
}

/// Operations offered to the HTTP and websocket layers.
#[derive(Clone)]
pub struct ChatService {
    repo: Arc<dyn ChatRepository>,
    registry: ConversationRegistry,
    messages: MessageStore,
    receipts: ReadReceiptManager,
    publisher: Arc<dyn EventPublisher>,
    presence: Arc<dyn PresenceDirectory>,
}

impl ChatService {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        publisher: Arc<dyn EventPublisher>,
        presence: Arc<dyn PresenceDirectory>,
    ) -> Self {
        Self {
            registry: ConversationRegistry::new(repo.clone()),
            messages: MessageStore::new(repo.clone()),
            receipts: ReadReceiptManager::new(repo.clone(), publisher.clone()),
            repo,
            publisher,
            presence,
        }
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    #[tracing::instrument(name = "Resolve or create private conversation.", skip(self))]
    pub async fn resolve_or_create_private_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> Result<views::ConversationView, ChatError> {
        let conversation = self.registry.get_or_create_private(user_id, other_id).await?;
        let participants = self.registry.participants(conversation.id).await?;
        self.view(conversation, user_id, participants).await
    }

    pub async fn find_private_conversation(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> Result<Option<views::ConversationView>, ChatError> {
        match self.registry.find_private(user_id, other_id).await? {
            Some(conversation) => {
                let participants = self.registry.participants(conversation.id).await?;
                Ok(Some(self.view(conversation, user_id, participants).await?))
            }
            None => Ok(None),
        }
    }

    pub async fn create_group(
        &self,
        creator: Uuid,
        title: &str,
        members: &[Uuid],
    ) -> Result<views::ConversationView, ChatError> {
        let conversation = self.registry.create_group(creator, title, members).await?;
        let participants = self.registry.participants(conversation.id).await?;
        self.view(conversation, creator, participants).await
    }

    pub async fn conversation_details(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<views::ConversationView, ChatError> {
        let (conversation, participants) = self
            .registry
            .ensure_participant(conversation_id, viewer_id)
            .await?;
        self.view(conversation, viewer_id, participants).await
    }

    #[tracing::instrument(name = "List user conversations.", skip(self))]
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<views::ConversationSummary>, ChatError> {
        let conversations = self.repo.conversations_for_user(user_id).await?;

        let mut rows = Vec::with_capacity(conversations.len());
        let mut user_ids = HashSet::new();
        for conversation in conversations {
            let participants = self.repo.participants(conversation.id).await?;
            user_ids.extend(participants.iter().map(|p| p.user_id));
            let last_message = match conversation.last_message_id {
                Some(id) => self.messages.fetch(id).await?,
                None => None,
            };
            rows.push((conversation, participants, last_message));
        }

        let ids: Vec<Uuid> = user_ids.into_iter().collect();
        let names = self.repo.user_names(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|(conversation, participants, last_message)| {
                views::conversation_summary(
                    &conversation,
                    user_id,
                    &participants,
                    &names,
                    last_message,
                )
            })
            .collect())
    }

    /// Persists the message, then tells every connection joined to the
    /// conversation. Delivery trouble never fails the send.
    #[tracing::instrument(name = "Send message.", skip(self, content))]
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        target: SendTarget,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation("message content must not be empty".to_string()));
        }

        let conversation_id = match target {
            SendTarget::Conversation(id) => {
                self.registry.ensure_participant(id, sender_id).await?;
                id
            }
            SendTarget::Recipient(recipient_id) => {
                self.registry
                    .get_or_create_private(sender_id, recipient_id)
                    .await?
                    .id
            }
        };

        let message = self
            .messages
            .append(conversation_id, sender_id, content, message_type)
            .await?;

        self.publisher
            .emit(conversation_id, ServerEvent::message_received(&message));

        Ok(message)
    }

    pub async fn history(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
        limit: Option<i64>,
        before: Option<Uuid>,
    ) -> Result<Vec<Message>, ChatError> {
        self.registry
            .ensure_participant(conversation_id, viewer_id)
            .await?;
        self.messages.history(conversation_id, limit, before).await
    }

    pub async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<ReadReceipt, ChatError> {
        self.registry
            .ensure_participant(conversation_id, reader_id)
            .await?;
        self.receipts.mark_read(conversation_id, reader_id).await
    }

    pub async fn list_online_users(&self) -> Vec<Uuid> {
        self.presence.list_online().await
    }

    pub async fn is_user_online(&self, user_id: Uuid) -> bool {
        self.presence.is_online(user_id).await
    }

    async fn view(
        &self,
        conversation: crate::models::Conversation,
        viewer_id: Uuid,
        participants: Vec<crate::models::ConversationParticipant>,
    ) -> Result<views::ConversationView, ChatError> {
        let ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
        let names = self.repo.user_names(&ids).await?;
        Ok(views::conversation_view(
            conversation,
            viewer_id,
            participants,
            &names,
        ))
    }
}
