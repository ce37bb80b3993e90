use crate::connectors::AuthError;
use crate::middleware::authentication::get_header;
use actix_web::dev::ServiceRequest;

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Result<&str, String> {
    let parts: Vec<&str> = authorization.split_whitespace().collect();
    if parts.len() != 2 {
        return Err("Invalid Authorization header format".to_string());
    }
    if parts[0] != "Bearer" {
        return Err("Expected Bearer scheme in Authorization header".to_string());
    }
    Ok(parts[1])
}

#[tracing::instrument(name = "Authenticate with bearer token", skip(req))]
pub async fn try_bearer(req: &mut ServiceRequest) -> Result<bool, AuthError> {
    let authorization =
        get_header::<String>(req, "authorization").map_err(AuthError::InvalidToken)?;
    let authorization = match authorization {
        Some(value) => value,
        None => return Ok(false),
    };

    let token = extract_bearer_token(&authorization)
        .map_err(AuthError::InvalidToken)?
        .to_string();

    super::authenticate(req, &token).await
}
