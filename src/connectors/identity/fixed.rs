use super::IdentityResolver;
use crate::connectors::AuthError;
use crate::models;
use async_trait::async_trait;
use std::collections::HashMap;

/// Token table fixed at construction. Used by local development and tests.
#[derive(Debug, Default, Clone)]
pub struct FixedIdentityResolver {
    users: HashMap<String, models::User>,
}

impl FixedIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user: models::User) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl IdentityResolver for FixedIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<models::User, AuthError> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}
