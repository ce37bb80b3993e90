use super::IdentityResolver;
use crate::connectors::AuthError;
use crate::models;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Body of the auth service's "who am I" endpoint.
#[derive(Debug, Deserialize)]
struct UserForm {
    id: Uuid,
    #[serde(alias = "username", alias = "userName")]
    name: String,
}

impl From<UserForm> for models::User {
    fn from(form: UserForm) -> Self {
        models::User::new(form.id, form.name)
    }
}

/// Resolved users keyed by token. Expired entries are swept on insert, at
/// most once per `ttl`, so tokens that are never presented again still leave.
pub struct TokenCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

struct CacheState {
    entries: HashMap<String, CachedUser>,
    next_sweep: Instant,
}

struct CachedUser {
    user: models::User,
    expires_at: Instant,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_sweep: Instant::now() + ttl,
            }),
        }
    }

    pub async fn get(&self, token: &str) -> Option<models::User> {
        let now = Instant::now();
        let state = self.state.lock().await;
        state
            .entries
            .get(token)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.user.clone())
    }

    pub async fn insert(&self, token: String, user: models::User) {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if now >= state.next_sweep {
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.expires_at > now);
            tracing::debug!(
                evicted = before - state.entries.len(),
                "Swept expired auth cache entries"
            );
            state.next_sweep = now + self.ttl;
        }

        state.entries.insert(
            token,
            CachedUser {
                user,
                expires_at: now + self.ttl,
            },
        );
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

/// Resolves opaque bearer tokens by asking the auth service who they belong to.
pub struct AuthServiceResolver {
    http_client: reqwest::Client,
    auth_url: String,
    cache: TokenCache,
}

impl AuthServiceResolver {
    pub fn new(auth_url: impl Into<String>, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("Falling back to default HTTP client: {}", err);
                reqwest::Client::new()
            });

        Self {
            http_client,
            auth_url: auth_url.into(),
            cache: TokenCache::new(cache_ttl),
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<models::User, AuthError> {
        let resp = self
            .http_client
            .get(&self.auth_url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                tracing::error!(target: "auth", error = %err, "Auth service request failed");
                AuthError::from(err)
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken("refused by auth service".to_string()));
        }
        if !status.is_success() {
            return Err(AuthError::ServiceUnavailable(format!(
                "auth service answered {}",
                status
            )));
        }

        resp.json::<UserForm>()
            .await
            .map(Into::into)
            .map_err(|err| AuthError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl IdentityResolver for AuthServiceResolver {
    #[tracing::instrument(name = "Resolve identity with auth service", skip(self, token))]
    async fn resolve(&self, token: &str) -> Result<models::User, AuthError> {
        if let Some(user) = self.cache.get(token).await {
            return Ok(user);
        }

        let user = self.fetch_user(token).await?;
        self.cache.insert(token.to_string(), user.clone()).await;
        Ok(user)
    }
}
