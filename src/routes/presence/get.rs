use crate::helpers::JsonResponse;
use crate::services::ChatService;
use actix_web::{get, web, Responder, Result};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub user_id: Uuid,
    pub online: bool,
}

/// GET /presence
#[tracing::instrument(name = "List online users.", skip(chat))]
#[get("")]
pub async fn list_handler(chat: web::Data<ChatService>) -> Result<impl Responder> {
    let online = chat.list_online_users().await;
    Ok(JsonResponse::<Uuid>::build().set_list(online).ok("OK"))
}

/// GET /presence/{user_id}
/// Unknown users are reported offline.
#[tracing::instrument(name = "Get user presence.", skip(chat))]
#[get("/{user_id}")]
pub async fn item_handler(
    path: web::Path<(Uuid,)>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let user_id = path.0;
    let online = chat.is_user_online(user_id).await;
    Ok(JsonResponse::build()
        .set_item(PresenceView { user_id, online })
        .ok("OK"))
}
