//! Core configuration

use chrono::Duration;
use std::time::Duration as StdDuration;

use crate::jwt::{DEFAULT_ACCESS_TTL_HOURS, DEFAULT_REFRESH_TTL_HOURS};
use crate::password::HasherConfig;

/// Tunables of the authentication core
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Lifetime of access tokens
    pub access_ttl: Duration,
    /// Lifetime of refresh tokens
    pub refresh_ttl: Duration,
    /// Argon2id work factor for new hashes
    pub hasher: HasherConfig,
    /// Default deadline for the repository calls of one request
    pub repository_timeout: StdDuration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(DEFAULT_ACCESS_TTL_HOURS),
            refresh_ttl: Duration::hours(DEFAULT_REFRESH_TTL_HOURS),
            hasher: HasherConfig::default(),
            repository_timeout: StdDuration::from_secs(10),
        }
    }
}
