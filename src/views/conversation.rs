use super::MessageView;
use crate::models;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Shown in place of a private conversation's title when the other
/// participant's name is not known here.
pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Uuid,
    pub title: String,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_id: Option<Uuid>,
    pub participants: Vec<ParticipantView>,
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub is_group: bool,
    pub last_message: Option<MessageView>,
}

/// Title a viewer sees: a group's own title, or the name of the other
/// participant of a private conversation.
pub fn display_title(
    conversation: &models::Conversation,
    viewer_id: Uuid,
    participants: &[models::ConversationParticipant],
    names: &HashMap<Uuid, String>,
) -> String {
    if conversation.is_group {
        return conversation.title.clone();
    }

    participants
        .iter()
        .find(|participant| participant.user_id != viewer_id)
        .and_then(|other| names.get(&other.user_id))
        .cloned()
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

pub fn conversation_view(
    conversation: models::Conversation,
    viewer_id: Uuid,
    participants: Vec<models::ConversationParticipant>,
    names: &HashMap<Uuid, String>,
) -> ConversationView {
    let title = display_title(&conversation, viewer_id, &participants, names);
    let participants = participants
        .into_iter()
        .map(|participant| ParticipantView {
            name: names
                .get(&participant.user_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            user_id: participant.user_id,
            is_admin: participant.is_admin,
            joined_at: participant.joined_at,
        })
        .collect();

    ConversationView {
        id: conversation.id,
        title,
        is_group: conversation.is_group,
        created_at: conversation.created_at,
        last_message_id: conversation.last_message_id,
        participants,
    }
}

pub fn conversation_summary(
    conversation: &models::Conversation,
    viewer_id: Uuid,
    participants: &[models::ConversationParticipant],
    names: &HashMap<Uuid, String>,
    last_message: Option<models::Message>,
) -> ConversationSummary {
    ConversationSummary {
        id: conversation.id,
        title: display_title(conversation, viewer_id, participants, names),
        is_group: conversation.is_group,
        last_message: last_message.map(MessageView::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversation, ConversationParticipant, Message, MessageType};

    fn private_between(a: Uuid, b: Uuid) -> (Conversation, Vec<ConversationParticipant>) {
        let conversation = Conversation::new_private();
        let participants = vec![
            ConversationParticipant::new(conversation.id, a, false),
            ConversationParticipant::new(conversation.id, b, false),
        ];
        (conversation, participants)
    }

    #[test]
    fn private_title_is_the_other_participant() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (conversation, participants) = private_between(alice, bob);
        let names = HashMap::from([
            (alice, "Alice".to_string()),
            (bob, "Bob".to_string()),
        ]);

        assert_eq!(display_title(&conversation, alice, &participants, &names), "Bob");
        assert_eq!(display_title(&conversation, bob, &participants, &names), "Alice");
    }

    #[test]
    fn private_title_falls_back_when_name_is_unknown() {
        let alice = Uuid::new_v4();
        let (conversation, participants) = private_between(alice, Uuid::new_v4());
        let names = HashMap::from([(alice, "Alice".to_string())]);

        assert_eq!(
            display_title(&conversation, alice, &participants, &names),
            UNKNOWN_USER
        );
    }

    #[test]
    fn group_keeps_its_own_title() {
        let owner = Uuid::new_v4();
        let conversation = Conversation::new_group("Release crew");
        let participants = vec![ConversationParticipant::new(conversation.id, owner, true)];

        let view = conversation_view(conversation, owner, participants, &HashMap::new());
        assert_eq!(view.title, "Release crew");
        assert!(view.participants[0].is_admin);
        assert_eq!(view.participants[0].name, UNKNOWN_USER);
    }

    #[test]
    fn summary_carries_last_message_preview() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (conversation, participants) = private_between(alice, bob);
        let last = Message::new(conversation.id, bob, "see you", MessageType::Text);

        let summary = conversation_summary(
            &conversation,
            alice,
            &participants,
            &HashMap::from([(bob, "Bob".to_string())]),
            Some(last.clone()),
        );

        assert_eq!(summary.title, "Bob");
        let preview = summary.last_message.unwrap();
        assert_eq!(preview.id, last.id);
        assert_eq!(preview.content, "see you");
    }

    #[test]
    fn view_serializes_camel_case() {
        let conversation = Conversation::new_group("Ops");
        let view = conversation_view(conversation, Uuid::new_v4(), vec![], &HashMap::new());
        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["isGroup"], true);
        assert!(value["lastMessageId"].is_null());
        assert!(value.get("createdAt").is_some());
    }
}
