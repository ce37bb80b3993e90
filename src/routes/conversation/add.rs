use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use crate::views;
use actix_web::{post, web, Responder, Result};
use serde_valid::Validate;
use std::sync::Arc;

/// POST /conversation/private
/// Returns the caller's private conversation with `userId`, creating it on first use.
#[tracing::instrument(name = "Resolve private conversation.", skip(chat))]
#[post("/private")]
pub async fn private_handler(
    user: web::ReqData<Arc<models::User>>,
    form: web::Json<forms::CreatePrivateConversation>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let view = chat
        .resolve_or_create_private_conversation(user.id, form.user_id)
        .await?;

    Ok(JsonResponse::build()
        .set_id(view.id)
        .set_item(view)
        .ok("OK"))
}

/// POST /conversation/group
#[tracing::instrument(name = "Create group conversation.", skip(chat))]
#[post("/group")]
pub async fn group_handler(
    user: web::ReqData<Arc<models::User>>,
    form: web::Json<forms::CreateGroupConversation>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    if let Err(errors) = form.validate() {
        return Err(JsonResponse::<views::ConversationView>::build().form_error(errors.to_string()));
    }

    let view = chat.create_group(user.id, &form.title, &form.members).await?;
    Ok(JsonResponse::build()
        .set_id(view.id)
        .set_item(view)
        .created("Created"))
}
