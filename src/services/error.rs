use crate::db::StoreError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use uuid::Uuid;

/// Failures surfaced by the chat core to its callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Both sides of a private conversation are the same user.
    SelfConversation,
    ConversationNotFound(Uuid),
    Validation(String),
    /// Caller is not a participant of the conversation.
    NotParticipant,
    /// Store unavailable or the write was rejected. Safe to retry.
    Persistence(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConversation => {
                write!(f, "Cannot open a private conversation with yourself")
            }
            Self::ConversationNotFound(id) => write!(f, "Conversation not found: {}", id),
            Self::Validation(msg) => write!(f, "Validation failed: {}", msg),
            Self::NotParticipant => write!(f, "Not a participant of this conversation"),
            Self::Persistence(msg) => write!(f, "Persistence failure: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConversationNotFound(id) => Self::ConversationNotFound(id),
            // only reaches here if the registry's re-fetch also lost the row
            StoreError::DuplicatePrivatePair(_) => Self::Persistence(err.to_string()),
            StoreError::Unavailable(msg) => Self::Persistence(msg),
        }
    }
}

impl ResponseError for ChatError {
    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Self::SelfConversation => "Invalid conversation",
            Self::ConversationNotFound(_) => "Conversation not found",
            Self::Validation(_) => "Validation error",
            Self::NotParticipant => "Forbidden",
            Self::Persistence(_) => "Service unavailable",
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "details": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::SelfConversation | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ConversationNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotParticipant => StatusCode::FORBIDDEN,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
