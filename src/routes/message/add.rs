use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use crate::views;
use actix_web::{post, web, Responder, Result};
use serde_valid::Validate;
use std::sync::Arc;

/// POST /message
/// `conversationId` sends into an existing conversation; `recipientId`
/// resolves (or opens) the private conversation with that user first.
#[tracing::instrument(name = "Send message.", skip(chat, form))]
#[post("")]
pub async fn add_handler(
    user: web::ReqData<Arc<models::User>>,
    form: web::Json<forms::SendMessage>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    if let Err(errors) = form.validate() {
        return Err(JsonResponse::<views::MessageView>::build().form_error(errors.to_string()));
    }
    let target = form
        .target()
        .map_err(|msg| JsonResponse::<views::MessageView>::build().form_error(msg))?;

    let message = chat
        .send_message(user.id, target, &form.content, form.message_type)
        .await?;

    Ok(JsonResponse::build()
        .set_id(message.id)
        .set_item(views::MessageView::from(message))
        .created("Sent"))
}
