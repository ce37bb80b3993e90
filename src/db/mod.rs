//! Persistence contract for conversations, participants and messages.
//!
//! Services only see [`ChatRepository`]. Two implementations exist:
//! [`PgChatRepository`] backed by Postgres, and [`InMemoryChatRepository`]
//! for local development and tests. Both enforce the same constraints:
//! one private conversation per unordered user pair, append plus
//! last-message pointer as one unit, and read transitions that never reverse.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryChatRepository;
pub use postgres::PgChatRepository;

use crate::models::{Conversation, ConversationParticipant, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Normalized unordered pair of distinct users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: Uuid,
    high: Uuid,
}

impl PairKey {
    /// `None` when both ids are the same user.
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn members(&self) -> [Uuid; 2] {
        [self.low, self.high]
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A concurrent writer already created the private conversation for this pair.
    DuplicatePrivatePair(PairKey),
    ConversationNotFound(Uuid),
    /// Store unreachable or the write was rejected. Nothing was committed.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicatePrivatePair(pair) => {
                write!(f, "Private conversation already exists for pair {}", pair)
            }
            Self::ConversationNotFound(id) => write!(f, "Conversation not found: {}", id),
            Self::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_private(&self, pair: &PairKey) -> Result<Option<Conversation>, StoreError>;

    /// Persists the conversation and both participant rows atomically.
    async fn insert_private(
        &self,
        pair: &PairKey,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError>;

    async fn insert_group(
        &self,
        conversation: Conversation,
        participants: Vec<ConversationParticipant>,
    ) -> Result<Conversation, StoreError>;

    async fn fetch_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StoreError>;

    async fn participants(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationParticipant>, StoreError>;

    /// Conversations the user takes part in, most recently active first.
    async fn conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, StoreError>;

    /// Inserts the message and advances the conversation's `last_message_id`
    /// in one unit. `sent_at` is raised to the conversation's latest `sent_at`
    /// if the clock went backwards, keeping per-conversation order.
    async fn append_message(&self, message: Message) -> Result<Message, StoreError>;

    async fn fetch_message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Up to `limit` messages appended before the message `before` (or the
    /// newest ones), returned oldest first. Messages sharing a `sent_at` are
    /// still paged exactly once. An unknown cursor yields an empty page.
    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> Result<Vec<Message>, StoreError>;

    /// Flips every unread message in the conversation not sent by `reader_id`
    /// to read in one batch. Returns the ids that changed.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError>;

    async fn user_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;

    async fn count_private(&self, pair: &PairKey) -> Result<i64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
