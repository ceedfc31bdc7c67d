//! Crate-level error taxonomy

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::jwt::TokenError;
use crate::password::PasswordError;
use crate::repository::RepositoryError;

/// Generic message for both unknown email and wrong password
pub const BAD_CREDENTIAL_MESSAGE: &str = "email or password is incorrect";

/// Errors surfaced by the authentication service
///
/// Every variant except `Fatal` is a normal outcome that the request boundary
/// turns into a response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("An account with this email or phone number already exists")]
    AlreadyExists,

    #[error("User not found")]
    NotFound,

    #[error("{}", BAD_CREDENTIAL_MESSAGE)]
    BadCredential,

    #[error("No authentication token provided")]
    MissingToken,

    #[error("Token is malformed or its signature is invalid")]
    MalformedToken,

    #[error("Token is expired")]
    ExpiredToken,

    #[error("Not allowed to access this resource")]
    Denied,

    #[error("Storage failed: {reason}")]
    StorageFailed { retryable: bool, reason: String },

    /// Hashing or signing broke; the process cannot continue safely
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl AuthError {
    /// Stable machine-readable code for responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::ValidationFailed(_) => "VALIDATION_FAILED",
            AuthError::AlreadyExists => "ALREADY_EXISTS",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::BadCredential => "BAD_CREDENTIAL",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::MalformedToken => "MALFORMED_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::Denied => "DENIED",
            AuthError::StorageFailed { .. } => "STORAGE_FAILED",
            AuthError::Fatal(_) => "FATAL",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::Fatal(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StorageFailed { retryable: true, .. })
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate => AuthError::AlreadyExists,
            RepositoryError::NotFound => AuthError::NotFound,
            other => AuthError::StorageFailed {
                retryable: other.is_retryable(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages("", &errors, &mut messages);
        messages.sort();
        AuthError::ValidationFailed(messages.join("; "))
    }
}

/// Flatten nested validation errors into "path: message" lines
fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push(format!("{}: {}", path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_messages(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(_) => AuthError::MalformedToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Signing(e) => AuthError::Fatal(format!("token signing failed: {}", e)),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Fatal(err.to_string())
    }
}
