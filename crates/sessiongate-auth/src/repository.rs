//! User repository contract consumed by the authentication core
//!
//! Storage lives outside this crate. Implementations must enforce that no two
//! users share a normalized email or phone and report a violation as
//! [`RepositoryError::Duplicate`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Identity, StoredTokens, UserRecord};
use crate::scope::RequestScope;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Email or phone already taken
    #[error("Duplicate email or phone")]
    Duplicate,

    #[error("Record not found")]
    NotFound,

    /// Deadline of the request scope passed
    #[error("Repository call timed out")]
    Timeout,

    /// Request scope was cancelled
    #[error("Repository call cancelled")]
    Cancelled,

    /// Backend could not be reached
    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure
    #[error("Repository error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::Timeout | RepositoryError::Cancelled | RepositoryError::Unavailable(_)
        )
    }
}

/// A user about to be created, with the first token pair issued at signup
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub identity: Identity,
    pub password_hash: String,
    pub tokens: StoredTokens,
}

/// Storage contract for users and their latest token pair
///
/// Every method receives the request's [`RequestScope`]; the core also wraps
/// each call in [`RequestScope::run`], so implementations may ignore it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by normalized email
    async fn find_by_email(
        &self,
        scope: &RequestScope,
        email: &str,
    ) -> Result<Option<UserRecord>, RepositoryError>;

    async fn find_by_id(
        &self,
        scope: &RequestScope,
        user_id: &str,
    ) -> Result<Option<Identity>, RepositoryError>;

    /// True when any user has this email or, if given, this phone
    async fn exists_by_email_or_phone(
        &self,
        scope: &RequestScope,
        email: &str,
        phone: Option<String>,
    ) -> Result<bool, RepositoryError>;

    /// Create the user and return its id
    async fn insert(&self, scope: &RequestScope, user: NewUser) -> Result<String, RepositoryError>;

    /// Insert or overwrite the latest token pair for `user_id`
    ///
    /// Returns `NotFound` when no such user exists.
    async fn upsert_tokens(
        &self,
        scope: &RequestScope,
        user_id: &str,
        tokens: StoredTokens,
    ) -> Result<(), RepositoryError>;
}
