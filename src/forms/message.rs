use crate::models::MessageType;
use crate::services::SendTarget;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use uuid::Uuid;

pub const MAX_CONTENT_LENGTH: usize = 4000;

#[derive(Serialize, Deserialize, Debug, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub conversation_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    #[validate(min_length = 1)]
    #[validate(max_length = 4000)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
}

impl SendMessage {
    /// Exactly one of `conversationId` and `recipientId` must be present.
    pub fn target(&self) -> Result<SendTarget, String> {
        match (self.conversation_id, self.recipient_id) {
            (Some(conversation_id), None) => Ok(SendTarget::Conversation(conversation_id)),
            (None, Some(recipient_id)) => Ok(SendTarget::Recipient(recipient_id)),
            (Some(_), Some(_)) => {
                Err("provide either conversationId or recipientId, not both".to_string())
            }
            (None, None) => Err("conversationId or recipientId is required".to_string()),
        }
    }
}
