use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames a client may send over the websocket, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Join {
        #[serde(alias = "conversationId")]
        conversation_id: Uuid,
    },
    MarkRead {
        #[serde(alias = "conversationId")]
        conversation_id: Uuid,
    },
    OnlineUsers,
    IsOnline {
        #[serde(alias = "userId")]
        user_id: Uuid,
    },
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::MarkRead { .. } => "mark_read",
            Self::OnlineUsers => "online_users",
            Self::IsOnline { .. } => "is_online",
        }
    }
}

/// Direct answers to a client command. Pushed events use `ServerEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Ack {
        command: String,
        #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
        conversation_id: Option<Uuid>,
    },
    Error {
        message: String,
    },
    OnlineUsers {
        #[serde(rename = "userIds")]
        user_ids: Vec<Uuid>,
    },
    IsOnline {
        #[serde(rename = "userId")]
        user_id: Uuid,
        online: bool,
    },
}

impl ServerReply {
    pub fn ack(command: &ClientCommand, conversation_id: Option<Uuid>) -> Self {
        Self::Ack {
            command: command.name().to_string(),
            conversation_id,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_accepts_both_field_spellings() {
        let id = Uuid::new_v4();
        let snake: ClientCommand =
            serde_json::from_value(json!({"type": "join", "conversation_id": id})).unwrap();
        let camel: ClientCommand =
            serde_json::from_value(json!({"type": "join", "conversationId": id})).unwrap();

        assert_eq!(snake, ClientCommand::Join { conversation_id: id });
        assert_eq!(snake, camel);
    }

    #[test]
    fn unit_command_parses_without_fields() {
        let command: ClientCommand =
            serde_json::from_value(json!({"type": "online_users"})).unwrap();
        assert_eq!(command, ClientCommand::OnlineUsers);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let parsed = serde_json::from_value::<ClientCommand>(json!({"type": "typing"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn ack_is_tagged_and_omits_missing_conversation() {
        let reply = ServerReply::ack(&ClientCommand::OnlineUsers, None);
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, json!({"type": "ack", "command": "online_users"}));
    }
}
