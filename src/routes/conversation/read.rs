use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use actix_web::{post, web, Responder, Result};
use std::sync::Arc;
use uuid::Uuid;

/// POST /conversation/{id}/read
/// Marks everything the other participants sent as read.
#[tracing::instrument(name = "Mark conversation read.", skip(chat))]
#[post("/{id}/read")]
pub async fn read_handler(
    user: web::ReqData<Arc<models::User>>,
    path: web::Path<(Uuid,)>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let receipt = chat.mark_conversation_read(path.0, user.id).await?;
    Ok(JsonResponse::build().set_item(receipt).ok("OK"))
}
