//! Signed session tokens (JWT, HMAC-SHA256)

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{Identity, Role};
use crate::secret::SigningSecret;

/// Default lifetime of an access token
pub const DEFAULT_ACCESS_TTL_HOURS: i64 = 24;
/// Default lifetime of a refresh token
pub const DEFAULT_REFRESH_TTL_HOURS: i64 = 168;

/// Opaque signed token string
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// Tokens are bearer credentials; keep them out of debug logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Which half of a token pair a claim set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in session tokens
///
/// Access tokens carry the full identity. Refresh tokens carry only the
/// subject, which is enough to reload the identity and mint a new pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Token kind
    pub typ: TokenKind,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Unique token id, distinguishes tokens minted in the same second
    pub jti: String,
}

// Lifetimes past the representable range saturate instead of overflowing
fn expiry(now: DateTime<Utc>, validity: Duration) -> i64 {
    now.checked_add_signed(validity)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .timestamp()
}

impl Claims {
    pub fn access(identity: &Identity, now: DateTime<Utc>, validity: Duration) -> Self {
        Self {
            sub: identity.user_id.clone(),
            email: Some(identity.email.clone()),
            first_name: Some(identity.first_name.clone()),
            last_name: Some(identity.last_name.clone()),
            role: Some(identity.role),
            typ: TokenKind::Access,
            iat: now.timestamp(),
            exp: expiry(now, validity),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn refresh(user_id: &str, now: DateTime<Utc>, validity: Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            email: None,
            first_name: None,
            last_name: None,
            role: None,
            typ: TokenKind::Refresh,
            iat: now.timestamp(),
            exp: expiry(now, validity),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// A token is expired once `exp <= now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Unparseable, bad signature, wrong algorithm or wrong token kind
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Signature is valid but `exp` has passed
    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Freshly issued access + refresh tokens
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues and validates session tokens with one process-wide secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec using HMAC-SHA256 over `secret`
    ///
    /// Validates signature, algorithm and presence of `sub`/`exp`. Expiry is
    /// checked against the injected clock rather than by `jsonwebtoken`, so
    /// tests control the boundary.
    pub fn new(secret: &SigningSecret, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl: Duration::hours(DEFAULT_ACCESS_TTL_HOURS),
            refresh_ttl: Duration::hours(DEFAULT_REFRESH_TTL_HOURS),
            clock,
        }
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn encode(&self, claims: &Claims) -> Result<Token, TokenError> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key)
            .map(Token)
            .map_err(TokenError::Signing)
    }

    pub fn issue_access_token(&self, identity: &Identity) -> Result<Token, TokenError> {
        self.encode(&Claims::access(identity, self.clock.now(), self.access_ttl))
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<Token, TokenError> {
        self.encode(&Claims::refresh(
            &identity.user_id,
            self.clock.now(),
            self.refresh_ttl,
        ))
    }

    /// Issue both tokens against a single clock reading
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        let access = Claims::access(identity, now, self.access_ttl);
        let refresh = Claims::refresh(&identity.user_id, now, self.refresh_ttl);

        Ok(TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
        })
    }

    /// Verify signature and expiry of any session token
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        if token_data.claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Validate a token that must be an access token
    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Access)
    }

    /// Validate a token that must be a refresh token
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_kind(token, TokenKind::Refresh)
    }

    fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        if claims.typ != expected {
            return Err(TokenError::Malformed(format!(
                "expected {:?} token, got {:?}",
                expected, claims.typ
            )));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TEST_SECRET: &[u8] = b"test_secret_key_1234567890";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn identity() -> Identity {
        Identity {
            user_id: "user-123".to_string(),
            email: "a@x.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            role: Role::User,
            created_at: start(),
        }
    }

    fn codec() -> (Arc<ManualClock>, TokenCodec) {
        let clock = Arc::new(ManualClock::new(start()));
        let secret = SigningSecret::new(TEST_SECRET.to_vec()).unwrap();
        let codec = TokenCodec::new(&secret, clock.clone());
        (clock, codec)
    }

    #[test]
    fn test_huge_lifetime_saturates_expiry() {
        let access = Claims::access(&identity(), start(), Duration::MAX);
        let refresh = Claims::refresh("user-123", start(), Duration::MAX);

        assert_eq!(access.exp, DateTime::<Utc>::MAX_UTC.timestamp());
        assert_eq!(refresh.exp, access.exp);
        assert!(!access.is_expired_at(start()));

        let (_clock, codec) = codec();
        let codec = codec.with_ttls(Duration::MAX, Duration::MAX);
        let pair = codec.issue_pair(&identity()).unwrap();
        assert!(codec.validate_access(pair.access_token.as_str()).is_ok());
    }

    #[test]
    fn test_access_token_round_trip() {
        let (_clock, codec) = codec();
        let token = codec.issue_access_token(&identity()).unwrap();

        let claims = codec.validate_access(token.as_str()).unwrap();

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.first_name.as_deref(), Some("Ada"));
        assert_eq!(claims.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(claims.role, Some(Role::User));
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.iat, start().timestamp());
        assert_eq!(claims.expires_at(), start() + Duration::hours(24));
    }

    #[test]
    fn test_refresh_token_carries_only_subject() {
        let (_clock, codec) = codec();
        let token = codec.issue_refresh_token(&identity()).unwrap();

        let claims = codec.validate_refresh(token.as_str()).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, None);
        assert_eq!(claims.role, None);
        assert_eq!(claims.expires_at(), start() + Duration::hours(168));
    }

    #[test]
    fn test_expired_just_after_ttl() {
        let (clock, codec) = codec();
        let token = codec.issue_access_token(&identity()).unwrap();

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(codec.validate_access(token.as_str()).is_ok());

        clock.advance(Duration::seconds(1) + Duration::milliseconds(1));
        assert!(matches!(
            codec.validate_access(token.as_str()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_expired_at_exact_boundary() {
        let (clock, codec) = codec();
        let token = codec.issue_access_token(&identity()).unwrap();

        clock.advance(Duration::hours(24));
        assert!(matches!(
            codec.validate(token.as_str()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_minted_25_hours_ago_is_expired() {
        let (clock, codec) = codec();
        clock.set(start() - Duration::hours(25));
        let token = codec.issue_access_token(&identity()).unwrap();

        clock.set(start());
        assert!(matches!(
            codec.validate_access(token.as_str()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (_clock, codec) = codec();
        for input in ["garbage", "", "a.b.c", "Bearer"] {
            assert!(
                matches!(codec.validate(input), Err(TokenError::Malformed(_))),
                "{:?} should be malformed",
                input
            );
        }
    }

    #[test]
    fn test_tampering_any_byte_is_malformed() {
        let (_clock, codec) = codec();
        let token = codec.issue_access_token(&identity()).unwrap().into_string();

        for (i, c) in token.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + c.len_utf8(), &replacement.to_string());

            assert!(
                matches!(codec.validate(&tampered), Err(TokenError::Malformed(_))),
                "tampering position {} was not detected",
                i
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let (clock, codec) = codec();
        let other = TokenCodec::new(
            &SigningSecret::new(b"another_secret_key_0987654321".to_vec()).unwrap(),
            clock,
        );
        let token = other.issue_access_token(&identity()).unwrap();

        assert!(matches!(
            codec.validate(token.as_str()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_expired_with_bad_signature_is_malformed() {
        let (clock, codec) = codec();
        let other = TokenCodec::new(
            &SigningSecret::new(b"another_secret_key_0987654321".to_vec()).unwrap(),
            clock.clone(),
        );
        let token = other.issue_access_token(&identity()).unwrap();
        clock.advance(Duration::days(30));

        assert!(matches!(
            codec.validate(token.as_str()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let (_clock, codec) = codec();
        let pair = codec.issue_pair(&identity()).unwrap();

        assert!(matches!(
            codec.validate_access(pair.refresh_token.as_str()),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            codec.validate_refresh(pair.access_token.as_str()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_pairs_issued_in_same_instant_differ() {
        let (_clock, codec) = codec();
        let first = codec.issue_pair(&identity()).unwrap();
        let second = codec.issue_pair(&identity()).unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(first.access_expires_at, second.access_expires_at);
    }

    #[test]
    fn test_custom_ttls() {
        let (clock, codec) = codec();
        let codec = codec.with_ttls(Duration::minutes(15), Duration::hours(1));
        let pair = codec.issue_pair(&identity()).unwrap();

        assert_eq!(pair.access_expires_at, start() + Duration::minutes(15));
        assert_eq!(pair.refresh_expires_at, start() + Duration::hours(1));

        clock.advance(Duration::minutes(16));
        assert!(codec.validate_refresh(pair.refresh_token.as_str()).is_ok());
        assert!(matches!(
            codec.validate_access(pair.access_token.as_str()),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let (_clock, codec) = codec();
        // {"alg":"none","typ":"JWT"} . {"sub":"x","typ":"access","iat":0,"exp":9999999999,"jti":"j"} .
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJzdWIiOiJ4IiwidHlwIjoiYWNjZXNzIiwiaWF0IjowLCJleHAiOjk5OTk5OTk5OTksImp0aSI6ImoifQ.";
        assert!(matches!(
            codec.validate(token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let (_clock, codec) = codec();
        let token = codec.issue_access_token(&identity()).unwrap();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
