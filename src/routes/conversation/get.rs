use crate::forms;
use crate::helpers::JsonResponse;
use crate::models;
use crate::services::ChatService;
use crate::views;
use actix_web::{get, web, Responder, Result};
use serde_valid::Validate;
use std::sync::Arc;
use uuid::Uuid;

/// GET /conversation
/// Conversations of the caller, most recently active first.
#[tracing::instrument(name = "List conversations.", skip(chat))]
#[get("")]
pub async fn list_handler(
    user: web::ReqData<Arc<models::User>>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let list = chat.list_conversations(user.id).await?;
    Ok(JsonResponse::<views::ConversationSummary>::build()
        .set_list(list)
        .ok("OK"))
}

/// GET /conversation/private/{user_id}
/// Lookup only; never creates.
#[tracing::instrument(name = "Get private conversation.", skip(chat))]
#[get("/private/{user_id}")]
pub async fn private_lookup_handler(
    user: web::ReqData<Arc<models::User>>,
    path: web::Path<(Uuid,)>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let other_id = path.0;
    chat.find_private_conversation(user.id, other_id)
        .await?
        .map(|view| JsonResponse::build().set_item(view).ok("OK"))
        .ok_or_else(|| {
            JsonResponse::<views::ConversationView>::build().not_found("Conversation not found")
        })
}

/// GET /conversation/{id}
#[tracing::instrument(name = "Get conversation.", skip(chat))]
#[get("/{id}")]
pub async fn item_handler(
    user: web::ReqData<Arc<models::User>>,
    path: web::Path<(Uuid,)>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    let view = chat.conversation_details(path.0, user.id).await?;
    Ok(JsonResponse::build().set_item(view).ok("OK"))
}

/// GET /conversation/{id}/messages?limit=&before=
/// History page, oldest first.
#[tracing::instrument(name = "Get conversation messages.", skip(chat))]
#[get("/{id}/messages")]
pub async fn messages_handler(
    user: web::ReqData<Arc<models::User>>,
    path: web::Path<(Uuid,)>,
    query: web::Query<forms::HistoryQuery>,
    chat: web::Data<ChatService>,
) -> Result<impl Responder> {
    if let Err(errors) = query.validate() {
        return Err(JsonResponse::<views::MessageView>::build().form_error(errors.to_string()));
    }

    let messages = chat
        .history(path.0, user.id, query.limit, query.before)
        .await?
        .into_iter()
        .map(views::MessageView::from)
        .collect();

    Ok(JsonResponse::<views::MessageView>::build()
        .set_list(messages)
        .ok("OK"))
}
