use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivateConversation {
    pub user_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupConversation {
    #[validate(min_length = 1)]
    #[validate(max_length = 255)]
    pub title: String,
    #[validate(min_items = 1)]
    #[validate(max_items = 256)]
    pub members: Vec<Uuid>,
}

/// `?limit=&before=` on the history endpoint. `before` is the id of the
/// oldest message the client already holds.
#[derive(Serialize, Deserialize, Debug, Default, Validate)]
pub struct HistoryQuery {
    #[validate(minimum = 1)]
    #[validate(maximum = 200)]
    pub limit: Option<i64>,
    pub before: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn group_without_members_is_invalid() {
        let form: CreateGroupConversation =
            serde_json::from_value(json!({"title": "Ops", "members": []})).unwrap();
        assert!(form.validate().is_err());
    }

    #[test]
    fn group_with_title_and_member_is_valid() {
        let form: CreateGroupConversation = serde_json::from_value(json!({
            "title": "Ops",
            "members": [Uuid::new_v4()],
        }))
        .unwrap();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn history_limit_is_bounded() {
        let query = HistoryQuery {
            limit: Some(500),
            before: None,
        };
        assert!(query.validate().is_err());
        assert!(HistoryQuery::default().validate().is_ok());
    }
}
