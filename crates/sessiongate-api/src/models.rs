use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sessiongate_auth::{Identity, IdentityContext, Role, Session};
use utoipa::ToSchema;

/// User role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    /// Regular user
    #[default]
    User,
    /// Administrator
    Admin,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => UserRole::User,
            Role::Admin => UserRole::Admin,
        }
    }
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => Role::User,
            UserRole::Admin => Role::Admin,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// User signup request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    /// Email address (case-insensitive, must be unique)
    pub email: String,
    /// Password (at least 6 characters)
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Phone number (must be unique when given, separators are ignored)
    #[serde(default)]
    pub phone: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// User email address
    pub email: String,
    /// User password
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// A refresh token previously issued by signup, login or refresh
    pub refresh_token: String,
}

/// Stored user profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for User {
    fn from(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            phone: identity.phone,
            role: identity.role.into(),
            created_at: identity.created_at,
        }
    }
}

/// Signup, login and refresh response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: User,
    /// Bearer token for protected endpoints
    pub access_token: String,
    /// Token for `/api/auth/refresh`
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user: session.identity.into(),
            access_token: session.tokens.access_token.into_string(),
            refresh_token: session.tokens.refresh_token.into_string(),
            access_expires_at: session.tokens.access_expires_at,
            refresh_expires_at: session.tokens.refresh_expires_at,
        }
    }
}

/// Identity decoded from the caller's access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    /// When the presented access token expires
    pub expires_at: DateTime<Utc>,
}

impl From<IdentityContext> for CurrentUser {
    fn from(ctx: IdentityContext) -> Self {
        Self {
            user_id: ctx.user_id,
            email: ctx.email,
            first_name: ctx.first_name,
            last_name: ctx.last_name,
            role: ctx.role.into(),
            expires_at: ctx.expires_at,
        }
    }
}
