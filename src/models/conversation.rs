use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conversation row. Participants and messages reference it by id; it never
/// embeds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_id: Option<Uuid>,
}

impl Conversation {
    pub fn new_private() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            is_group: false,
            created_at: Utc::now(),
            last_message_id: None,
        }
    }

    pub fn new_group(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            is_group: true,
            created_at: Utc::now(),
            last_message_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationParticipant {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

impl ConversationParticipant {
    pub fn new(conversation_id: Uuid, user_id: Uuid, is_admin: bool) -> Self {
        Self {
            user_id,
            conversation_id,
            joined_at: Utc::now(),
            is_admin,
        }
    }
}
