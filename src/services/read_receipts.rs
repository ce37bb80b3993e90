use super::ChatError;
use crate::db::ChatRepository;
use crate::realtime::{EventPublisher, ServerEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a mark-read call. `message_ids` is empty when nothing was unread.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: Uuid,
    pub read_at: DateTime<Utc>,
    pub message_ids: Vec<Uuid>,
}

impl ReadReceipt {
    pub fn changed(&self) -> bool {
        !self.message_ids.is_empty()
    }
}

#[derive(Clone)]
pub struct ReadReceiptManager {
    repo: Arc<dyn ChatRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl ReadReceiptManager {
    pub fn new(repo: Arc<dyn ChatRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { repo, publisher }
    }

    /// Flips every unread message from the other participants to read in one
    /// batch. `conversation.read` goes out only when something changed.
    #[tracing::instrument(name = "Mark conversation read.", skip(self))]
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<ReadReceipt, ChatError> {
        let read_at = Utc::now();
        let message_ids = self
            .repo
            .mark_read(conversation_id, reader_id, read_at)
            .await?;

        let receipt = ReadReceipt {
            conversation_id,
            read_at,
            message_ids,
        };

        if receipt.changed() {
            tracing::debug!(count = receipt.message_ids.len(), "Messages marked read");
            self.publisher
                .emit(conversation_id, ServerEvent::conversation_read(conversation_id));
        }

        Ok(receipt)
    }
}
