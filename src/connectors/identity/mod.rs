//! Turns the caller's bearer credential into a [`models::User`].
//!
//! Credentials are issued elsewhere; this service only reads them.

mod auth_service;
mod fixed;
mod jwt;

pub use auth_service::{AuthServiceResolver, TokenCache};
pub use fixed::FixedIdentityResolver;
pub use jwt::{
    parse_jwt_claims, user_from_jwt_claims, validate_jwt_expiration, JwtClaims,
    JwtIdentityResolver,
};

use crate::connectors::AuthError;
use crate::models;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<models::User, AuthError>;
}
