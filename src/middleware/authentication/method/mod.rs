mod f_bearer;
mod f_query;

pub use f_bearer::try_bearer;
pub use f_query::try_query_token;

use crate::connectors::{AuthError, IdentityResolver};
use actix_web::{dev::ServiceRequest, web, HttpMessage};
use std::sync::Arc;

/// Resolves `token` and attaches the user to the request.
async fn authenticate(req: &mut ServiceRequest, token: &str) -> Result<bool, AuthError> {
    let resolver = req
        .app_data::<web::Data<Arc<dyn IdentityResolver>>>()
        .map(|resolver| resolver.get_ref().clone())
        .ok_or_else(|| AuthError::ServiceUnavailable("identity resolver not configured".to_string()))?;

    let user = resolver.resolve(token).await?;
    tracing::debug!(user_id = %user.id, "Caller authenticated");

    if req.extensions_mut().insert(Arc::new(user)).is_some() {
        tracing::warn!("user already logged");
    }
    Ok(true)
}
