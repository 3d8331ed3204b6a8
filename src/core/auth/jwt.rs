//! Token signing and verification
//!
//! Access tokens are signed RS256 with the process's RSA key pair and
//! verified with the public key alone, so any worker can authenticate a
//! request without a store round-trip. Refresh tokens are signed HS256 with
//! the shared secret; their claims carry the session row id that the
//! rotation state machine joins on. Access tokens live 1 day, refresh
//! tokens 1 year.

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::credentials::Keyring;
use crate::core::db::models::{Principal, UserRole};

/// Default access token lifetime (1 day)
const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60 * 24;

/// Default refresh token lifetime (1 year)
const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 365;

const DEFAULT_ISSUER: &str = "authgate";

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Token issuer
    pub issuer: String,
    /// Access token lifetime in seconds
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: i64,
}

impl TokenConfig {
    pub fn new() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_ttl_secs: REFRESH_TOKEN_TTL_SECS,
        }
    }

    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let access_ttl_secs = std::env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ACCESS_TOKEN_TTL_SECS);

        let refresh_ttl_secs = std::env::var("REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(REFRESH_TOKEN_TTL_SECS);

        let issuer =
            std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());

        Self {
            issuer,
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Set access token lifetime
    pub fn access_ttl(mut self, secs: i64) -> Self {
        self.access_ttl_secs = secs;
        self
    }

    /// Set refresh token lifetime
    pub fn refresh_ttl(mut self, secs: i64) -> Self {
        self.refresh_ttl_secs = secs;
        self
    }

    /// Set issuer
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Token errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Claims of an access token: the principal plus standard JWT fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub id: Uuid,
    /// User role
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Claims of a refresh token. `id` is the session row id, the join key
/// into the sessions table; the token itself is never stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Session row id
    pub id: Uuid,
    /// User id
    pub uid: Uuid,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Token service: signs and verifies both token kinds.
#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    keyring: Keyring,
}

impl TokenService {
    pub fn new(keyring: Keyring, config: TokenConfig) -> Self {
        Self { config, keyring }
    }

    /// Sign an access token for the principal (RS256, private key).
    pub fn sign_access(&self, principal: &Principal) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            id: principal.id,
            role: principal.role,
            iat: now,
            exp: now + self.config.access_ttl_secs,
            iss: self.config.issuer.clone(),
        };

        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.keyring.access_encoding,
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify an access token against the public key.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let data = decode::<AccessClaims>(token, &self.keyring.access_decoding, &validation)?;
        Ok(data.claims)
    }

    /// Sign a refresh token binding the session row to the user (HS256).
    pub fn sign_refresh(&self, session_id: Uuid, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            id: session_id,
            uid: user_id,
            iat: now,
            exp: now + self.config.refresh_ttl_secs,
            iss: self.config.issuer.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keyring.refresh_encoding,
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a refresh token against the shared secret.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let data = decode::<RefreshClaims>(token, &self.keyring.refresh_decoding, &validation)?;
        Ok(data.claims)
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl_secs
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.config.refresh_ttl_secs
    }
}
