//! In-memory user repository for tests and local runs

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{normalize_email, normalize_phone, Credential, Identity, StoredTokens, UserRecord};
use crate::repository::{NewUser, RepositoryError, UserRepository};
use crate::scope::RequestScope;

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    password_hash: String,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, StoredUser>,
    tokens: HashMap<String, StoredTokens>,
}

/// `UserRepository` backed by a `HashMap` behind an async `RwLock`
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    state: RwLock<State>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest token pair recorded for a user
    pub async fn tokens_for(&self, user_id: &str) -> Option<StoredTokens> {
        self.state.read().await.tokens.get(user_id).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.users
            .values()
            .any(|u| normalize_email(&u.identity.email) == email)
    }

    fn phone_taken(&self, phone: &str) -> bool {
        let phone = normalize_phone(phone);
        self.users.values().any(|u| {
            u.identity
                .phone
                .as_deref()
                .map(normalize_phone)
                .is_some_and(|p| p == phone)
        })
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(
        &self,
        _scope: &RequestScope,
        email: &str,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let email = normalize_email(email);
        let state = self.state.read().await;

        Ok(state
            .users
            .values()
            .find(|u| normalize_email(&u.identity.email) == email)
            .map(|u| UserRecord {
                identity: u.identity.clone(),
                credential: Credential {
                    user_id: u.identity.user_id.clone(),
                    password_hash: u.password_hash.clone(),
                },
            }))
    }

    async fn find_by_id(
        &self,
        _scope: &RequestScope,
        user_id: &str,
    ) -> Result<Option<Identity>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(user_id).map(|u| u.identity.clone()))
    }

    async fn exists_by_email_or_phone(
        &self,
        _scope: &RequestScope,
        email: &str,
        phone: Option<String>,
    ) -> Result<bool, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.email_taken(email) || phone.as_deref().is_some_and(|p| state.phone_taken(p)))
    }

    async fn insert(&self, _scope: &RequestScope, mut user: NewUser) -> Result<String, RepositoryError> {
        user.identity.phone = user.identity.phone.as_deref().map(normalize_phone);
        let mut state = self.state.write().await;

        let phone_taken = user
            .identity
            .phone
            .as_deref()
            .is_some_and(|p| state.phone_taken(p));
        if state.email_taken(&user.identity.email)
            || phone_taken
            || state.users.contains_key(&user.identity.user_id)
        {
            return Err(RepositoryError::Duplicate);
        }

        let user_id = user.identity.user_id.clone();
        state.tokens.insert(user_id.clone(), user.tokens);
        state.users.insert(
            user_id.clone(),
            StoredUser {
                identity: user.identity,
                password_hash: user.password_hash,
            },
        );
        debug!("Inserted user {}", user_id);

        Ok(user_id)
    }

    async fn upsert_tokens(
        &self,
        _scope: &RequestScope,
        user_id: &str,
        tokens: StoredTokens,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(user_id) {
            return Err(RepositoryError::NotFound);
        }
        state.tokens.insert(user_id.to_string(), tokens);
        Ok(())
    }
}
