use crate::connectors::AuthError;
use actix_web::{dev::ServiceRequest, web};
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a websocket upgrade, so `?token=` is
/// accepted as well.
#[tracing::instrument(name = "Authenticate with query token", skip(req))]
pub async fn try_query_token(req: &mut ServiceRequest) -> Result<bool, AuthError> {
    let token = web::Query::<TokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.into_inner().token)
        .filter(|token| !token.is_empty());

    match token {
        Some(token) => super::authenticate(req, &token).await,
        None => Ok(false),
    }
}
