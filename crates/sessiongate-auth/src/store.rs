//! Write-through persistence of the latest token pair

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::jwt::Token;
use crate::models::StoredTokens;
use crate::repository::{RepositoryError, UserRepository};
use crate::scope::RequestScope;

/// Records issued token pairs against a user id
#[derive(Clone)]
pub struct TokenStore {
    repository: Arc<dyn UserRepository>,
}

impl TokenStore {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Upsert `(access, refresh, now)` for `user_id`
    ///
    /// Idempotent. Failures are returned, never swallowed.
    pub async fn record(
        &self,
        scope: &RequestScope,
        user_id: &str,
        access_token: &Token,
        refresh_token: &Token,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let tokens = StoredTokens {
            access_token: access_token.as_str().to_string(),
            refresh_token: refresh_token.as_str().to_string(),
            updated_at: now,
        };

        scope
            .run(self.repository.upsert_tokens(scope, user_id, tokens))
            .await
            .inspect(|_| debug!("Recorded token pair for user {}", user_id))
            .inspect_err(|e| warn!("Failed to record token pair for user {}: {}", user_id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryUserRepository;
    use crate::models::{Identity, Role};
    use crate::repository::{MockUserRepository, NewUser};
    use std::time::Duration;

    async fn seed_user(repo: &InMemoryUserRepository, scope: &RequestScope, user_id: &str) {
        let identity = Identity {
            user_id: user_id.to_string(),
            email: format!("{}@x.com", user_id),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role: Role::User,
            created_at: Utc::now(),
        };
        repo.insert(
            scope,
            NewUser {
                identity,
                password_hash: "$argon2id$stub".to_string(),
                tokens: StoredTokens {
                    access_token: "a0".to_string(),
                    refresh_token: "r0".to_string(),
                    updated_at: Utc::now(),
                },
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_record_writes_latest_pair() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let store = TokenStore::new(repo.clone());
        let scope = RequestScope::new(Duration::from_secs(5));
        let now = Utc::now();
        seed_user(&repo, &scope, "u1").await;

        store
            .record(
                &scope,
                "u1",
                &Token::new("a1".to_string()),
                &Token::new("r1".to_string()),
                now,
            )
            .await
            .unwrap();
        store
            .record(
                &scope,
                "u1",
                &Token::new("a2".to_string()),
                &Token::new("r2".to_string()),
                now,
            )
            .await
            .unwrap();

        let stored = repo.tokens_for("u1").await.unwrap();
        assert_eq!(stored.access_token, "a2");
        assert_eq!(stored.refresh_token, "r2");
        assert_eq!(stored.updated_at, now);
    }

    #[tokio::test]
    async fn test_record_propagates_failure() {
        let mut repo = MockUserRepository::new();
        repo.expect_upsert_tokens()
            .times(1)
            .returning(|_, _, _| Err(RepositoryError::Unavailable("connection refused".to_string())));

        let store = TokenStore::new(Arc::new(repo));
        let scope = RequestScope::new(Duration::from_secs(5));

        let result = store
            .record(
                &scope,
                "u1",
                &Token::new("a".to_string()),
                &Token::new("r".to_string()),
                Utc::now(),
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_record_for_unknown_user_is_not_found() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let store = TokenStore::new(repo.clone());
        let scope = RequestScope::new(Duration::from_secs(5));

        let result = store
            .record(
                &scope,
                "ghost",
                &Token::new("a".to_string()),
                &Token::new("r".to_string()),
                Utc::now(),
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }
}
