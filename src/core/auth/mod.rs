//! Authentication module for Authgate
//!
//! This module provides the authentication core:
//! - Credential material (bcrypt hashing, signing keys)
//! - Token signing and verification (RS256 access, HS256 refresh)
//! - Refresh token rotation with reuse detection
//! - Cookie transport for the token pair
//! - REST API endpoints for auth operations

pub mod api;
pub mod cookies;
pub mod credentials;
pub mod jwt;
pub mod service;

pub use api::{ApiError, AuthApiState, auth_api_router, health_router, not_found};
pub use cookies::{ACCESS_TOKEN, REFRESH_TOKEN, clear_auth_cookies, set_auth_cookies};
pub use credentials::{CredentialError, Keyring, hash_password, verify_password};
pub use jwt::{AccessClaims, RefreshClaims, TokenConfig, TokenError, TokenService};
pub use service::{
    AuthError, AuthService, IssuedTokens, LoginRequest, RegisterRequest, RotationPolicy,
};
