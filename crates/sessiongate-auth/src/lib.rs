//! Session authentication core
//!
//! Password hashing, signed access/refresh tokens, request authentication and
//! role-based access decisions, over an injected [`UserRepository`] and
//! [`Clock`].

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod memory;
pub mod models;
pub mod password;
pub mod policy;
pub mod repository;
pub mod scope;
pub mod secret;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, BAD_CREDENTIAL_MESSAGE};
pub use gate::{extract_token, AuthenticationGate, IdentityContext};
pub use jwt::{Claims, Token, TokenCodec, TokenError, TokenKind, TokenPair};
pub use memory::InMemoryUserRepository;
pub use models::{Credential, Identity, ProfileFields, Role, SignupRequest, StoredTokens, UserRecord};
pub use password::{CredentialHasher, HasherConfig, PasswordError};
pub use policy::{authorize, require_role, require_self_or_role, Decision};
pub use repository::{NewUser, RepositoryError, UserRepository};
pub use scope::RequestScope;
pub use secret::{EnvSecretProvider, SecretError, SecretProvider, SigningSecret, StaticSecretProvider};
pub use service::{AuthService, Session};
pub use store::TokenStore;

// Re-export useful types
pub use async_trait::async_trait;
