//! Request-level authentication
//!
//! The gate turns a raw header value into an [`IdentityContext`] or a
//! rejection:
//!
//! ```text
//! NoToken      -> Rejected(MissingToken)
//! TokenPresent -> Validating
//! Validating   -> Rejected(MalformedToken | ExpiredToken)
//!               | Authenticated(IdentityContext)
//! ```
//!
//! It never touches stored state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::{Claims, TokenCodec, TokenError};
use crate::models::Role;

/// Validated caller identity attached to one in-flight request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// When the access token backing this context expires
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<Claims> for IdentityContext {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let expires_at = claims.expires_at();
        match (claims.email, claims.first_name, claims.last_name, claims.role) {
            (Some(email), Some(first_name), Some(last_name), Some(role)) => Ok(Self {
                user_id: claims.sub,
                email,
                first_name,
                last_name,
                role,
                expires_at,
            }),
            _ => Err(AuthError::MalformedToken),
        }
    }
}

/// Pull the raw token out of a header value
///
/// Accepts either the bare token or `Bearer <token>` (scheme is
/// case-insensitive). Returns `None` when nothing usable is left.
pub fn extract_token(raw_header: Option<&str>) -> Option<&str> {
    let value = raw_header?.trim();

    let token = match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Validates access tokens and builds identity contexts
#[derive(Clone)]
pub struct AuthenticationGate {
    codec: Arc<TokenCodec>,
}

impl AuthenticationGate {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    pub fn authenticate(&self, raw_header: Option<&str>) -> Result<IdentityContext, AuthError> {
        let Some(token) = extract_token(raw_header) else {
            debug!("Authentication rejected: no token");
            return Err(AuthError::MissingToken);
        };

        let claims = self.codec.validate_access(token).map_err(|e| {
            match &e {
                TokenError::Expired => debug!("Authentication rejected: token expired"),
                _ => debug!("Authentication rejected: {}", e),
            }
            AuthError::from(e)
        })?;

        let ctx = IdentityContext::try_from(claims)?;
        debug!("Authenticated user {} ({})", ctx.user_id, ctx.role);
        Ok(ctx)
    }
}
