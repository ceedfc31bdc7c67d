//! Signup, login, refresh, authenticate and authorize
//!
//! `AuthService` wires the hasher, codec, token store, gate and policy around
//! an injected repository and clock. Repository calls run under the caller's
//! [`RequestScope`]; hashing runs on the blocking pool and is never cancelled
//! once started.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::gate::{extract_token, AuthenticationGate, IdentityContext};
use crate::jwt::{TokenCodec, TokenPair};
use crate::models::{normalize_email, Identity, Role, SignupRequest, StoredTokens};
use crate::password::CredentialHasher;
use crate::policy::{self, Decision};
use crate::repository::{NewUser, UserRepository};
use crate::scope::RequestScope;
use crate::secret::SigningSecret;
use crate::store::TokenStore;

/// Identity plus the token pair issued for it
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenPair,
}

/// Authentication and authorization facade
pub struct AuthService {
    repository: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    codec: Arc<TokenCodec>,
    store: TokenStore,
    gate: AuthenticationGate,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        secret: &SigningSecret,
        repository: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(config.hasher)?;
        let codec = Arc::new(
            TokenCodec::new(secret, clock).with_ttls(config.access_ttl, config.refresh_ttl),
        );

        Ok(Self {
            store: TokenStore::new(repository.clone()),
            gate: AuthenticationGate::new(codec.clone()),
            repository,
            hasher,
            codec,
            config,
        })
    }

    /// Fresh scope using the configured repository timeout
    pub fn new_scope(&self) -> RequestScope {
        RequestScope::new(self.config.repository_timeout)
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Register a new user and issue their first token pair
    pub async fn signup(
        &self,
        scope: &RequestScope,
        request: SignupRequest,
    ) -> Result<Session, AuthError> {
        let request = SignupRequest {
            password: request.password,
            profile: request.profile.normalized(),
        };
        request.validate()?;
        let profile = request.profile;

        let exists = scope
            .run(self.repository.exists_by_email_or_phone(
                scope,
                &profile.email,
                profile.phone.clone(),
            ))
            .await?;
        if exists {
            info!("Signup rejected: {} or its phone is already registered", profile.email);
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = self.hash_password(request.password).await?;

        let now = self.codec.now();
        let identity = Identity {
            user_id: Uuid::new_v4().to_string(),
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone: profile.phone,
            role: profile.role,
            created_at: now,
        };
        let tokens = self.codec.issue_pair(&identity)?;

        let new_user = NewUser {
            identity: identity.clone(),
            password_hash,
            tokens: StoredTokens {
                access_token: tokens.access_token.as_str().to_string(),
                refresh_token: tokens.refresh_token.as_str().to_string(),
                updated_at: now,
            },
        };
        scope.run(self.repository.insert(scope, new_user)).await?;

        info!("Signed up user {} ({})", identity.user_id, identity.role);
        Ok(Session { identity, tokens })
    }

    /// Verify credentials and issue a new token pair
    ///
    /// Unknown email and wrong password both return `BadCredential`.
    pub async fn login(
        &self,
        scope: &RequestScope,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let email = normalize_email(email);

        let Some(record) = scope.run(self.repository.find_by_email(scope, &email)).await? else {
            debug!("Login rejected: no user with email {}", email);
            return Err(AuthError::BadCredential);
        };

        let valid = self
            .verify_password(password.to_string(), record.credential.password_hash)
            .await?;
        if !valid {
            debug!("Login rejected: wrong password for user {}", record.identity.user_id);
            return Err(AuthError::BadCredential);
        }

        let tokens = self.issue_and_record(scope, &record.identity).await?;

        info!("User {} logged in", record.identity.user_id);
        Ok(Session {
            identity: record.identity,
            tokens,
        })
    }

    /// Exchange a refresh token for a brand-new pair
    ///
    /// The identity is reloaded so role and name changes reach the new access
    /// token.
    pub async fn refresh(
        &self,
        scope: &RequestScope,
        refresh_token: &str,
    ) -> Result<Session, AuthError> {
        let token = extract_token(Some(refresh_token)).ok_or(AuthError::MissingToken)?;
        let claims = self.codec.validate_refresh(token)?;

        let identity = scope
            .run(self.repository.find_by_id(scope, &claims.sub))
            .await?
            .ok_or_else(|| {
                warn!("Refresh token for unknown user {}", claims.sub);
                AuthError::NotFound
            })?;

        let tokens = self.issue_and_record(scope, &identity).await?;

        info!("Rotated token pair for user {}", identity.user_id);
        Ok(Session { identity, tokens })
    }

    /// Validate a raw header value and build the identity context
    pub fn authenticate(&self, raw_header: Option<&str>) -> Result<IdentityContext, AuthError> {
        self.gate.authenticate(raw_header)
    }

    /// Decide whether `ctx` may act on a resource
    pub fn authorize(
        &self,
        ctx: &IdentityContext,
        required_role: Role,
        owner_id: Option<&str>,
    ) -> Decision {
        let decision = policy::authorize(ctx, required_role, owner_id);
        if !decision.is_allowed() {
            debug!(
                "Denied user {} ({}) requiring {} on {:?}",
                ctx.user_id, ctx.role, required_role, owner_id
            );
        }
        decision
    }

    pub async fn find_identity(
        &self,
        scope: &RequestScope,
        user_id: &str,
    ) -> Result<Identity, AuthError> {
        scope
            .run(self.repository.find_by_id(scope, user_id))
            .await?
            .ok_or(AuthError::NotFound)
    }

    async fn issue_and_record(
        &self,
        scope: &RequestScope,
        identity: &Identity,
    ) -> Result<TokenPair, AuthError> {
        let tokens = self.codec.issue_pair(identity)?;
        self.store
            .record(
                scope,
                &identity.user_id,
                &tokens.access_token,
                &tokens.refresh_token,
                self.codec.now(),
            )
            .await?;
        Ok(tokens)
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Fatal(format!("password hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn verify_password(&self, candidate: String, stored: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&candidate, &stored))
            .await
            .map_err(|e| AuthError::Fatal(format!("password verification task failed: {}", e)))
    }
}
