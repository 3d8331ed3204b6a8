//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling
//! `dotenvy::dotenv()`. Missing or malformed values are a `ConfigError`,
//! fatal at startup, never a per-request error.

use std::path::PathBuf;

use crate::core::auth::service::RotationPolicy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PRIVATE_KEY_PATH: &str = "certs/private.pem";
const DEFAULT_PUBLIC_KEY_PATH: &str = "certs/public.pem";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_addr: String,

    /// PostgreSQL connection URL
    pub database_url: String,

    /// Path to the PEM-encoded RSA private key (signs access tokens)
    pub private_key_path: PathBuf,

    /// Path to the PEM-encoded RSA public key (verifies access tokens)
    pub public_key_path: PathBuf,

    /// Shared secret signing refresh tokens
    pub refresh_secret: String,

    /// What a successful rotation does to the user's other sessions
    pub rotation_policy: RotationPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| ConfigError::Missing("REFRESH_TOKEN_SECRET"))?;

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let private_key_path = std::env::var("ACCESS_PRIVATE_KEY_PATH")
            .unwrap_or_else(|_| DEFAULT_PRIVATE_KEY_PATH.to_string())
            .into();

        let public_key_path = std::env::var("ACCESS_PUBLIC_KEY_PATH")
            .unwrap_or_else(|_| DEFAULT_PUBLIC_KEY_PATH.to_string())
            .into();

        let rotation_policy = match std::env::var("AUTH_ROTATION_POLICY") {
            Ok(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "AUTH_ROTATION_POLICY",
                reason,
            })?,
            Err(_) => RotationPolicy::default(),
        };

        Ok(Self {
            bind_addr,
            database_url,
            private_key_path,
            public_key_path,
            refresh_secret,
            rotation_policy,
        })
    }
}
