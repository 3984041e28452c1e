//! JWT token issuing and validation
//!
//! HS256 tokens carrying `sub` (username), `iss`, `aud`, `iat`, `exp`, `jti`
//! and a `type` claim separating access from refresh tokens. Revocation goes
//! through a [`BlacklistStore`] keyed by the token's signature segment.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::blacklist::BlacklistStore;
use crate::config::JwtSettings;

const BLACKLIST_KEY_PREFIX: &str = "jwt:blacklist:";

/// JWT-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    InvalidClaims(String),

    #[error("Token expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Expected {expected} token")]
    WrongType { expected: TokenKind },

    #[error("Token subject does not match")]
    SubjectMismatch,
}

/// Token type carried in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Unique per token, so two tokens minted in the same second still differ
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenKind,
}

impl Claims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Seconds until `exp`, never negative
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }

    pub fn ensure_subject(&self, expected_username: &str) -> Result<(), TokenError> {
        if self.sub != expected_username {
            return Err(TokenError::SubjectMismatch);
        }
        Ok(())
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes bearer tokens
pub struct TokenService {
    settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    blacklist: Arc<dyn BlacklistStore>,
}

impl TokenService {
    pub fn new(settings: JwtSettings, blacklist: Arc<dyn BlacklistStore>) -> Self {
        let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Expiry is checked by hand so it can be reported separately
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            settings,
            encoding_key,
            decoding_key,
            validation,
            blacklist,
        }
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.settings.access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.settings.refresh_token_ttl
    }

    pub fn blacklist_backend(&self) -> &'static str {
        self.blacklist.backend()
    }

    pub fn issue_access_token(&self, username: &str) -> Result<IssuedToken, TokenError> {
        self.issue(username, TokenKind::Access, self.settings.access_token_ttl)
    }

    pub fn issue_refresh_token(&self, username: &str) -> Result<IssuedToken, TokenError> {
        self.issue(username, TokenKind::Refresh, self.settings.refresh_token_ttl)
    }

    fn issue(&self, username: &str, kind: TokenKind, ttl: Duration) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = Claims {
            sub: username.to_string(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: kind,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer and audience. Expiry is NOT checked here.
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::MissingRequiredClaim(_)
                | ErrorKind::ImmatureSignature
                | ErrorKind::InvalidAlgorithm => TokenError::InvalidClaims(e.to_string()),
                _ => TokenError::Malformed(e.to_string()),
            })
    }

    /// Signature, expiry and blacklist
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.parse(token)?;
        if claims.is_expired(Utc::now()) {
            return Err(TokenError::Expired);
        }
        if self.is_blacklisted(token).await {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// [`validate`](Self::validate) plus a subject check
    pub async fn validate_for(&self, token: &str, expected_username: &str) -> Result<Claims, TokenError> {
        let claims = self.validate(token).await?;
        claims.ensure_subject(expected_username)?;
        Ok(claims)
    }

    /// Validate and require a specific token type
    pub async fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.validate(token).await?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }

    /// Fails open: a cache error is logged and the token is treated as live.
    pub async fn is_blacklisted(&self, token: &str) -> bool {
        let key = blacklist_key(token);
        match self.blacklist.contains(&key).await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!(error = %e, backend = self.blacklist.backend(), "Blacklist lookup failed, allowing token");
                false
            }
        }
    }

    /// Revoke a token for the rest of its lifetime.
    ///
    /// Tokens that do not verify or are already expired are ignored. Cache
    /// failures are logged, not returned.
    pub async fn blacklist(&self, token: &str) {
        let claims = match self.parse(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Not blacklisting an unverifiable token");
                return;
            }
        };

        let remaining = claims.remaining_seconds(Utc::now());
        if remaining == 0 {
            tracing::debug!(sub = %claims.sub, "Token already expired, nothing to blacklist");
            return;
        }

        let key = blacklist_key(token);
        match self
            .blacklist
            .insert(&key, std::time::Duration::from_secs(remaining as u64))
            .await
        {
            Ok(()) => tracing::info!(sub = %claims.sub, ttl_seconds = remaining, "Token blacklisted"),
            Err(e) => tracing::error!(error = %e, sub = %claims.sub, "Failed to blacklist token"),
        }
    }
}

/// Cache key for a token: its signature segment, or the whole string if it has none.
pub fn blacklist_key(token: &str) -> String {
    let signature = token.rsplit('.').next().filter(|s| !s.is_empty()).unwrap_or(token);
    format!("{}{}", BLACKLIST_KEY_PREFIX, signature)
}
