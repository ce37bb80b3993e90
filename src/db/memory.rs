use super::{ChatRepository, PairKey, StoreError};
use crate::models::{Conversation, ConversationParticipant, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    conversations: HashMap<Uuid, Conversation>,
    private_pairs: HashMap<PairKey, Uuid>,
    participants: HashMap<Uuid, Vec<ConversationParticipant>>,
    messages: HashMap<Uuid, Message>,
    // message ids per conversation, in append order
    timeline: HashMap<Uuid, Vec<Uuid>>,
    users: HashMap<Uuid, String>,
}

impl State {
    fn last_activity(&self, conversation: &Conversation) -> DateTime<Utc> {
        conversation
            .last_message_id
            .and_then(|id| self.messages.get(&id))
            .map(|message| message.sent_at)
            .unwrap_or(conversation.created_at)
    }
}

/// Process-local store with the same constraints as the Postgres schema.
///
/// Every write takes the lock once and applies all of its rows before
/// releasing it, so readers never see half of a write.
pub struct InMemoryChatRepository {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Stands in for the auth service's user table.
    pub async fn register_user(&self, id: Uuid, name: impl Into<String>) {
        self.state.write().await.users.insert(id, name.into());
    }

    /// Makes every call fail with `StoreError::Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.read().await.conversations.len()
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryChatRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn find_private(&self, pair: &PairKey) -> Result<Option<Conversation>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .private_pairs
            .get(pair)
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn insert_private(
        &self,
        pair: &PairKey,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.private_pairs.contains_key(pair) {
            return Err(StoreError::DuplicatePrivatePair(*pair));
        }

        state.private_pairs.insert(*pair, conversation.id);
        state.participants.insert(conversation.id, participants);
        state
            .conversations
            .insert(conversation.id, conversation.clone());

        Ok(conversation)
    }

    async fn insert_group(
        &self,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.participants.insert(conversation.id, participants);
        state
            .conversations
            .insert(conversation.id, conversation.clone());

        Ok(conversation)
    }

    async fn fetch_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.conversations.get(&id).cloned())
    }

    async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationParticipant>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .participants
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut conversations: Vec<Conversation> = state
            .participants
            .iter()
            .filter(|(_, members)| members.iter().any(|p| p.user_id == user_id))
            .filter_map(|(id, _)| state.conversations.get(id).cloned())
            .collect();

        conversations.sort_by(|a, b| state.last_activity(b).cmp(&state.last_activity(a)));
        Ok(conversations)
    }

    async fn append_message(&self, mut message: Message) -> Result<Message, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&message.conversation_id) {
            return Err(StoreError::ConversationNotFound(message.conversation_id));
        }

        let latest = state
            .timeline
            .get(&message.conversation_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.messages.get(id))
            .map(|last| last.sent_at);
        if let Some(latest) = latest {
            if message.sent_at < latest {
                message.sent_at = latest;
            }
        }

        state.messages.insert(message.id, message.clone());
        state
            .timeline
            .entry(message.conversation_id)
            .or_default()
            .push(message.id);
        if let Some(conversation) = state.conversations.get_mut(&message.conversation_id) {
            conversation.last_message_id = Some(message.id);
        }

        Ok(message)
    }

    async fn fetch_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> Result<Vec<Message>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let ids = match state.timeline.get(&conversation_id) {
            Some(ids) => ids.as_slice(),
            None => return Ok(Vec::new()),
        };

        // timeline position breaks ties between equal `sent_at` values
        let end = match before {
            Some(cursor) => match ids.iter().position(|id| *id == cursor) {
                Some(position) => position,
                None => return Ok(Vec::new()),
            },
            None => ids.len(),
        };

        let mut page: Vec<Message> = ids[..end]
            .iter()
            .rev()
            .filter_map(|id| state.messages.get(id))
            .take(limit)
            .cloned()
            .collect();
        page.reverse();

        Ok(page)
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }

        let ids = state
            .timeline
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();

        let mut flipped = Vec::new();
        for id in ids {
            if let Some(message) = state.messages.get_mut(&id) {
                if message.sender_id != reader_id && message.mark_read(read_at) {
                    flipped.push(id);
                }
            }
        }

        Ok(flipped)
    }

    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|name| (*id, name.clone())))
            .collect())
    }

    async fn count_private(&self, pair: &PairKey) -> Result<i64, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.private_pairs.contains_key(pair) as i64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;
    use chrono::Duration;

    async fn private_conversation(
        repo: &InMemoryChatRepository,
        a: Uuid,
        b: Uuid,
    ) -> Conversation {
        let pair = PairKey::new(a, b).unwrap();
        let conversation = Conversation::new_private();
        let participants = pair
            .members()
            .iter()
            .map(|user| ConversationParticipant::new(conversation.id, *user, false))
            .collect();
        repo.insert_private(&pair, conversation, participants)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn second_private_insert_for_pair_is_rejected() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let first = private_conversation(&repo, a, b).await;

        let pair = PairKey::new(b, a).unwrap();
        let second = Conversation::new_private();
        let result = repo.insert_private(&pair, second, Vec::new()).await;

        assert_eq!(result, Err(StoreError::DuplicatePrivatePair(pair)));
        assert_eq!(repo.conversation_count().await, 1);
        assert_eq!(repo.find_private(&pair).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn append_advances_pointer_and_keeps_order() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = private_conversation(&repo, a, b).await;

        let first = repo
            .append_message(Message::new(conversation.id, a, "one", MessageType::Text))
            .await
            .unwrap();

        let mut late = Message::new(conversation.id, b, "two", MessageType::Text);
        late.sent_at = first.sent_at - Duration::seconds(30);
        let second = repo.append_message(late).await.unwrap();

        assert_eq!(second.sent_at, first.sent_at);
        let stored = repo.fetch_conversation(conversation.id).await.unwrap().unwrap();
        assert_eq!(stored.last_message_id, Some(second.id));

        let history = repo.messages(conversation.id, 50, None).await.unwrap();
        let ids: Vec<Uuid> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn append_to_missing_conversation_writes_nothing() {
        let repo = InMemoryChatRepository::new();
        let missing = Uuid::new_v4();
        let result = repo
            .append_message(Message::new(missing, Uuid::new_v4(), "hi", MessageType::Text))
            .await;

        assert_eq!(result, Err(StoreError::ConversationNotFound(missing)));
        assert_eq!(repo.message_count().await, 0);
    }

    #[tokio::test]
    async fn mark_read_skips_own_and_already_read_messages() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = private_conversation(&repo, a, b).await;

        let from_a = repo
            .append_message(Message::new(conversation.id, a, "from a", MessageType::Text))
            .await
            .unwrap();
        let from_b = repo
            .append_message(Message::new(conversation.id, b, "from b", MessageType::Text))
            .await
            .unwrap();

        let first_read = Utc::now();
        let flipped = repo.mark_read(conversation.id, b, first_read).await.unwrap();
        assert_eq!(flipped, vec![from_a.id]);

        let again = repo
            .mark_read(conversation.id, b, first_read + Duration::seconds(10))
            .await
            .unwrap();
        assert!(again.is_empty());

        let a_message = repo.fetch_message(from_a.id).await.unwrap().unwrap();
        assert_eq!(a_message.read_at, Some(first_read));
        let b_message = repo.fetch_message(from_b.id).await.unwrap().unwrap();
        assert!(!b_message.is_read);
        assert!(b_message.read_at.is_none());
    }

    #[tokio::test]
    async fn messages_page_backwards_from_cursor() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = private_conversation(&repo, a, b).await;

        let base = Utc::now();
        let mut sent = Vec::new();
        for i in 0..5 {
            let mut message = Message::new(conversation.id, a, format!("m{i}"), MessageType::Text);
            message.sent_at = base + Duration::seconds(i);
            sent.push(repo.append_message(message).await.unwrap());
        }

        let newest = repo.messages(conversation.id, 2, None).await.unwrap();
        assert_eq!(newest.iter().map(|m| m.id).collect::<Vec<_>>(), vec![sent[3].id, sent[4].id]);

        let older = repo
            .messages(conversation.id, 2, Some(sent[3].id))
            .await
            .unwrap();
        assert_eq!(older.iter().map(|m| m.id).collect::<Vec<_>>(), vec![sent[1].id, sent[2].id]);
    }

    #[tokio::test]
    async fn equal_timestamps_are_paged_exactly_once() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = private_conversation(&repo, a, b).await;

        let instant = Utc::now();
        let mut sent = Vec::new();
        for i in 0..4 {
            let mut message = Message::new(conversation.id, a, format!("m{i}"), MessageType::Text);
            message.sent_at = instant;
            sent.push(repo.append_message(message).await.unwrap());
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = repo.messages(conversation.id, 2, cursor).await.unwrap();
            if page.is_empty() {
                break;
            }
            cursor = Some(page[0].id);
            seen.splice(0..0, page.into_iter().map(|m| m.id));
        }

        assert_eq!(seen, sent.iter().map(|m| m.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unknown_cursor_yields_an_empty_page() {
        let repo = InMemoryChatRepository::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = private_conversation(&repo, a, b).await;
        repo.append_message(Message::new(conversation.id, a, "hi", MessageType::Text))
            .await
            .unwrap();

        let page = repo
            .messages(conversation.id, 10, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn conversations_for_user_orders_by_activity() {
        let repo = InMemoryChatRepository::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let with_b = private_conversation(&repo, a, b).await;
        let with_c = private_conversation(&repo, a, c).await;

        let mut message = Message::new(with_b.id, b, "ping", MessageType::Text);
        message.sent_at = Utc::now() + Duration::seconds(60);
        repo.append_message(message).await.unwrap();

        let listed = repo.conversations_for_user(a).await.unwrap();
        assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![with_b.id, with_c.id]);
        assert_eq!(repo.conversations_for_user(c).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let repo = InMemoryChatRepository::new();
        repo.set_unavailable(true);

        assert!(matches!(repo.ping().await, Err(StoreError::Unavailable(_))));
        let pair = PairKey::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(
            repo.find_private(&pair).await,
            Err(StoreError::Unavailable(_))
        ));

        repo.set_unavailable(false);
        assert!(repo.ping().await.is_ok());
    }
}
