//! Identity and credential records shared by every component

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use crate::error::AuthError;

/// Role carried by an identity and embedded in access tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular user, may only touch their own resources
    #[default]
    User,
    /// Administrator
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AuthError::ValidationFailed(format!(
                "role must be USER or ADMIN, got '{}'",
                other
            ))),
        }
    }
}

/// A registered user as seen by the rest of the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque, stable user id
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Stored password digest for a user
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub user_id: String,
    /// PHC-formatted Argon2id hash
    pub password_hash: String,
}

/// Identity plus credential, as returned by an email lookup
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub identity: Identity,
    pub credential: Credential,
}

/// Latest token pair persisted for a user
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

// Dot-atom local part, hostname labels without leading or trailing hyphens
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
    )
    .unwrap()
});
// Normalized form: optional leading '+', then E.164 digits
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{5,15}$").unwrap());

/// Profile fields supplied at signup
///
/// Validation rules expect the normalized form, see [`ProfileFields::normalized`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfileFields {
    #[validate(
        length(max = 254, message = "email is too long"),
        regex(path = *EMAIL_REGEX, message = "invalid email address")
    )]
    pub email: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub last_name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone_format"))]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Signup input: raw password plus profile
#[derive(Debug, Clone, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(nested)]
    pub profile: ProfileFields,
}

/// Normalize an email for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize a phone number for storage and lookups
///
/// Drops the usual separators so "+44 20 7946-0000" and "+442079460000"
/// compare equal. Anything else is kept and left for validation to reject.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

impl ProfileFields {
    /// Return a copy with normalized email, phone and trimmed names
    pub fn normalized(&self) -> Self {
        Self {
            email: normalize_email(&self.email),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: self
                .phone
                .as_deref()
                .map(normalize_phone)
                .filter(|p| !p.is_empty()),
            role: self.role,
        }
    }
}

fn validate_phone_format(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone").with_message("invalid phone number".into()))
    }
}
