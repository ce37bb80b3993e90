use super::ChatError;
use crate::db::{ChatRepository, PairKey, StoreError};
use crate::models::{Conversation, ConversationParticipant};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Owns conversation membership and the one-private-conversation-per-pair rule.
///
/// The rule is enforced by the store's uniqueness on the pair key, never by
/// a lock held here, so it holds across server instances sharing one store.
#[derive(Clone)]
pub struct ConversationRegistry {
    repo: Arc<dyn ChatRepository>,
}

impl ConversationRegistry {
    pub fn new(repo: Arc<dyn ChatRepository>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(name = "Get or create private conversation.", skip(self))]
    pub async fn get_or_create_private(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Conversation, ChatError> {
        let pair = PairKey::new(user_a, user_b).ok_or(ChatError::SelfConversation)?;

        if let Some(existing) = self.repo.find_private(&pair).await? {
            return Ok(existing);
        }

        let conversation = Conversation::new_private();
        let participants = pair
            .members()
            .iter()
            .map(|user_id| ConversationParticipant::new(conversation.id, *user_id, false))
            .collect();

        match self
            .repo
            .insert_private(&pair, conversation, participants)
            .await
        {
            Ok(created) => {
                tracing::info!(conversation_id = %created.id, "Private conversation created");
                Ok(created)
            }
            Err(StoreError::DuplicatePrivatePair(pair)) => {
                tracing::debug!("Lost private conversation race for {}, re-fetching", pair);
                self.repo.find_private(&pair).await?.ok_or_else(|| {
                    ChatError::Persistence(format!(
                        "private conversation for {} vanished after a uniqueness conflict",
                        pair
                    ))
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Lookup only. Never creates.
    #[tracing::instrument(name = "Find private conversation.", skip(self))]
    pub async fn find_private(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Option<Conversation>, ChatError> {
        let pair = PairKey::new(user_a, user_b).ok_or(ChatError::SelfConversation)?;
        Ok(self.repo.find_private(&pair).await?)
    }

    /// Creates a group with `creator` as its admin. Repeated member ids collapse.
    #[tracing::instrument(name = "Create group conversation.", skip(self, members))]
    pub async fn create_group(
        &self,
        creator: Uuid,
        title: &str,
        members: &[Uuid],
    ) -> Result<Conversation, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::Validation("group title must not be empty".to_string()));
        }

        let mut seen = HashSet::from([creator]);
        let others: Vec<Uuid> = members
            .iter()
            .copied()
            .filter(|member| seen.insert(*member))
            .collect();
        if others.is_empty() {
            return Err(ChatError::Validation(
                "group needs at least one member besides its creator".to_string(),
            ));
        }

        let conversation = Conversation::new_group(title);
        let mut participants = vec![ConversationParticipant::new(conversation.id, creator, true)];
        participants.extend(
            others
                .into_iter()
                .map(|member| ConversationParticipant::new(conversation.id, member, false)),
        );

        let created = self.repo.insert_group(conversation, participants).await?;
        tracing::info!(conversation_id = %created.id, "Group conversation created");
        Ok(created)
    }

    pub async fn conversation(&self, conversation_id: Uuid) -> Result<Conversation, ChatError> {
        self.repo
            .fetch_conversation(conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound(conversation_id))
    }

    pub async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationParticipant>, ChatError> {
        Ok(self.repo.participants(conversation_id).await?)
    }

    /// Loads the conversation and its participants, failing with
    /// `NotParticipant` when `user_id` is not among them.
    pub async fn ensure_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Conversation, Vec<ConversationParticipant>), ChatError> {
        let conversation = self.conversation(conversation_id).await?;
        let participants = self.participants(conversation_id).await?;

        if !participants.iter().any(|p| p.user_id == user_id) {
            tracing::debug!(
                conversation_id = %conversation_id,
                user_id = %user_id,
                "Rejected non-participant"
            );
            return Err(ChatError::NotParticipant);
        }
        Ok((conversation, participants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryChatRepository;
    use crate::models::Message;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry() -> (Arc<InMemoryChatRepository>, ConversationRegistry) {
        let repo = Arc::new(InMemoryChatRepository::new());
        (repo.clone(), ConversationRegistry::new(repo))
    }

    #[tokio::test]
    async fn resolving_twice_returns_same_conversation() {
        let (repo, registry) = registry();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = registry.get_or_create_private(a, b).await.unwrap();
        for _ in 0..5 {
            let again = registry.get_or_create_private(b, a).await.unwrap();
            assert_eq!(again.id, first.id);
        }
        assert_eq!(repo.conversation_count().await, 1);

        let participants = registry.participants(first.id).await.unwrap();
        let mut ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
        ids.sort();
        assert_eq!(ids, PairKey::new(a, b).unwrap().members().to_vec());
        assert!(!first.is_group);
        assert!(first.title.is_empty());
    }

    #[tokio::test]
    async fn self_conversation_is_rejected_and_nothing_persists() {
        let (repo, registry) = registry();
        let a = Uuid::new_v4();

        let err = registry.get_or_create_private(a, a).await.unwrap_err();
        assert_eq!(err, ChatError::SelfConversation);
        assert_eq!(repo.conversation_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolution_creates_one_conversation() {
        let (repo, registry) = registry();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        registry.get_or_create_private(a, b).await
                    } else {
                        registry.get_or_create_private(b, a).await
                    }
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().id);
        }

        assert_eq!(ids.len(), 1);
        let pair = PairKey::new(a, b).unwrap();
        assert_eq!(repo.count_private(&pair).await.unwrap(), 1);
    }

    /// Hides the existing conversation from the first lookup, so the
    /// registry always walks into the uniqueness conflict.
    struct StaleFirstLookup {
        inner: InMemoryChatRepository,
        hidden: AtomicBool,
    }

    #[async_trait]
    impl ChatRepository for StaleFirstLookup {
        async fn find_private(&self, pair: &PairKey) -> Result<Option<Conversation>, StoreError> {
            if self.hidden.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_private(pair).await
        }

        async fn insert_private(
            &self,
            pair: &PairKey,
            conversation: Conversation,
            participants: Vec<ConversationParticipant>,
        ) -> Result<Conversation, StoreError> {
            self.inner.insert_private(pair, conversation, participants).await
        }

        async fn insert_group(
            &self,
            conversation: Conversation,
            participants: Vec<ConversationParticipant>,
        ) -> Result<Conversation, StoreError> {
            self.inner.insert_group(conversation, participants).await
        }

        async fn fetch_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError> {
            self.inner.fetch_conversation(id).await
        }

        async fn participants(
            &self,
            conversation_id: Uuid,
        ) -> Result<Vec<ConversationParticipant>, StoreError> {
            self.inner.participants(conversation_id).await
        }

        async fn conversations_for_user(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<Conversation>, StoreError> {
            self.inner.conversations_for_user(user_id).await
        }

        async fn append_message(&self, message: Message) -> Result<Message, StoreError> {
            self.inner.append_message(message).await
        }

        async fn fetch_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
            self.inner.fetch_message(id).await
        }

        async fn messages(
            &self,
            conversation_id: Uuid,
            limit: i64,
            before: Option<Uuid>,
        ) -> Result<Vec<Message>, StoreError> {
            self.inner.messages(conversation_id, limit, before).await
        }

        async fn mark_read(
            &self,
            conversation_id: Uuid,
            reader_id: Uuid,
            read_at: DateTime<Utc>,
        ) -> Result<Vec<Uuid>, StoreError> {
            self.inner.mark_read(conversation_id, reader_id, read_at).await
        }

        async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
            self.inner.user_names(ids).await
        }

        async fn count_private(&self, pair: &PairKey) -> Result<i64, StoreError> {
            self.inner.count_private(pair).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn lost_race_returns_the_winning_conversation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let repo = Arc::new(StaleFirstLookup {
            inner: InMemoryChatRepository::new(),
            hidden: AtomicBool::new(false),
        });
        let registry = ConversationRegistry::new(repo.clone());

        let winner = registry.get_or_create_private(a, b).await.unwrap();
        repo.hidden.store(true, Ordering::SeqCst);
        let loser = registry.get_or_create_private(b, a).await.unwrap();

        assert_eq!(loser.id, winner.id);
        assert_eq!(repo.inner.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn find_private_never_creates() {
        let (repo, registry) = registry();
        let found = registry
            .find_private(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(repo.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn group_makes_creator_admin_and_collapses_duplicates() {
        let (_repo, registry) = registry();
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();

        let group = registry
            .create_group(creator, "  Weekend  ", &[member, member, creator])
            .await
            .unwrap();
        assert!(group.is_group);
        assert_eq!(group.title, "Weekend");

        let participants = registry.participants(group.id).await.unwrap();
        assert_eq!(participants.len(), 2);
        let admin = participants.iter().find(|p| p.user_id == creator).unwrap();
        assert!(admin.is_admin);
        let other = participants.iter().find(|p| p.user_id == member).unwrap();
        assert!(!other.is_admin);
    }

    #[tokio::test]
    async fn group_requires_title_and_members() {
        let (_repo, registry) = registry();
        let creator = Uuid::new_v4();

        let untitled = registry.create_group(creator, "  ", &[Uuid::new_v4()]).await;
        assert!(matches!(untitled, Err(ChatError::Validation(_))));

        let lonely = registry.create_group(creator, "Solo", &[creator]).await;
        assert!(matches!(lonely, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn outsiders_fail_participant_check() {
        let (_repo, registry) = registry();
        let a = Uuid::new_v4();
        let conversation = registry
            .get_or_create_private(a, Uuid::new_v4())
            .await
            .unwrap();

        assert!(registry.ensure_participant(conversation.id, a).await.is_ok());
        assert_eq!(
            registry
                .ensure_participant(conversation.id, Uuid::new_v4())
                .await
                .unwrap_err(),
            ChatError::NotParticipant
        );

        let missing = Uuid::new_v4();
        assert_eq!(
            registry.ensure_participant(missing, a).await.unwrap_err(),
            ChatError::ConversationNotFound(missing)
        );
    }
}
