//! Signing secret loading
//!
//! The secret is read once at startup. A missing or empty secret is a startup
//! failure, never a per-request one.

use std::fmt;
use thiserror::Error;

/// Minimum accepted secret length in bytes
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Signing secret is not set (expected in {0})")]
    Missing(String),

    #[error("Signing secret is too short: {actual} bytes, need at least {min}")]
    TooShort { actual: usize, min: usize },
}

/// Process-wide HMAC secret
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(SecretError::TooShort {
                actual: bytes.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<{} bytes redacted>)", self.0.len())
    }
}

/// Supplies the signing secret
pub trait SecretProvider {
    fn signing_secret(&self) -> Result<SigningSecret, SecretError>;
}

/// Reads the secret from an environment variable
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub const DEFAULT_VAR: &'static str = "SESSIONGATE_SECRET";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl SecretProvider for EnvSecretProvider {
    fn signing_secret(&self) -> Result<SigningSecret, SecretError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => SigningSecret::new(value.into_bytes()),
            _ => Err(SecretError::Missing(self.var.clone())),
        }
    }
}

/// Secret given directly (CLI flag, tests)
#[derive(Debug, Clone)]
pub struct StaticSecretProvider {
    secret: Option<Vec<u8>>,
}

impl StaticSecretProvider {
    pub fn new(secret: Option<impl Into<Vec<u8>>>) -> Self {
        Self {
            secret: secret.map(Into::into),
        }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn signing_secret(&self) -> Result<SigningSecret, SecretError> {
        match &self.secret {
            Some(bytes) if !bytes.is_empty() => SigningSecret::new(bytes.clone()),
            _ => Err(SecretError::Missing("configuration".to_string())),
        }
    }
}
