//! Authentication service
//!
//! Business logic for registration, login, token rotation and logout,
//! coordinating the principal store, session store and token service. The
//! centerpiece is `rotate`: every refresh exchange atomically consumes the
//! presented token's session row and mints a replacement, and a token
//! presented a second time is treated as evidence of theft, so every other
//! live session of that user is revoked before the request is rejected.

use std::str::FromStr;

use uuid::Uuid;

use crate::core::auth::credentials::{self, CredentialError};
use crate::core::auth::jwt::{TokenError, TokenService};
use crate::core::db::models::{Principal, Session};
use crate::core::db::repositories::{NewUser, PrincipalStore, SessionStore, StoreError};

/// What a successful rotation does to the user's other active sessions.
///
/// `RevokeConsumed` invalidates only the presented grant; `RevokeAllActive`
/// additionally revokes every other live session on each rotation, so at
/// most one refresh lineage exists per user. Reuse detection behaves the
/// same under both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    #[default]
    RevokeConsumed,
    RevokeAllActive,
}

impl FromStr for RotationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revoke-consumed" => Ok(RotationPolicy::RevokeConsumed),
            "revoke-all" => Ok(RotationPolicy::RevokeAllActive),
            other => Err(format!(
                "unknown rotation policy {other:?}, expected \"revoke-consumed\" or \"revoke-all\""
            )),
        }
    }
}

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already exists!")]
    EmailAlreadyExists,

    #[error("Name must be at least 3 characters")]
    NameTooShort,

    #[error("Must be a valid email")]
    InvalidEmail,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid => AuthError::Unauthorized,
            TokenError::Encoding(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Registration request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A freshly issued session with its signed token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub session: Session,
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<P, S> {
    principals: P,
    sessions: S,
    tokens: TokenService,
    policy: RotationPolicy,
}

impl<P: PrincipalStore, S: SessionStore> AuthService<P, S> {
    /// Create a new authentication service
    pub fn new(principals: P, sessions: S, tokens: TokenService, policy: RotationPolicy) -> Self {
        Self {
            principals,
            sessions,
            tokens,
            policy,
        }
    }

    /// Validate display name (minimum 3 characters)
    fn validate_name(name: &str) -> Result<(), AuthError> {
        if name.chars().count() < 3 {
            return Err(AuthError::NameTooShort);
        }
        Ok(())
    }

    /// Validate email format
    fn validate_email(email: &str) -> Result<(), AuthError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(AuthError::InvalidEmail);
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(AuthError::InvalidEmail);
        }

        // Domain needs at least one non-empty label on each side of a dot.
        if !domain.contains('.') || domain.split('.').any(|part| part.is_empty()) {
            return Err(AuthError::InvalidEmail);
        }

        Ok(())
    }

    /// Validate password (minimum 6 characters)
    fn validate_password(password: &str) -> Result<(), AuthError> {
        if password.chars().count() < 6 {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(())
    }

    /// Register a new user and issue their first session.
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<(Principal, IssuedTokens), AuthError> {
        Self::validate_name(&request.name)?;
        Self::validate_email(&request.email)?;
        Self::validate_password(&request.password)?;

        if self.principals.find_by_email(&request.email).await?.is_some() {
            tracing::warn!(email = %request.email, "registration rejected, email already exists");
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = credentials::hash_password(&request.password)?;
        let user = self
            .principals
            .create(NewUser {
                name: request.name,
                email: request.email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "user registered");

        let principal = Principal::from(&user);
        let tokens = self.issue(&principal).await?;
        Ok((principal, tokens))
    }

    /// Authenticate credentials and issue a new session.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(
        &self,
        request: LoginRequest,
    ) -> Result<(Principal, IssuedTokens), AuthError> {
        let Some(user) = self.principals.find_by_email(&request.email).await? else {
            tracing::warn!(email = %request.email, "login failed, unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !credentials::verify_password(&request.password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed, wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "user logged in");

        let principal = Principal::from(&user);
        let tokens = self.issue(&principal).await?;
        Ok((principal, tokens))
    }

    /// Mint a new session row and sign the access/refresh pair for it.
    ///
    /// The session insert is the only side effect; callers that must
    /// guarantee "principal exists AND session issued" pass an
    /// already-committed principal id.
    pub async fn issue(&self, principal: &Principal) -> Result<IssuedTokens, AuthError> {
        let session = self.sessions.create(principal.id).await?;
        let access_token = self.tokens.sign_access(principal)?;
        let refresh_token = self.tokens.sign_refresh(session.id, principal.id)?;

        Ok(IssuedTokens {
            session,
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a fresh session and token pair.
    ///
    /// The presented token's session row is consumed with a single
    /// compare-and-swap; of two concurrent rotations on the same token, at
    /// most one can win. A token whose row is already consumed (or was
    /// never issued) is treated as stolen: every remaining active session
    /// of that user is revoked before the request is rejected.
    pub async fn rotate(&self, refresh_cookie: Option<&str>) -> Result<IssuedTokens, AuthError> {
        let token = refresh_cookie.ok_or(AuthError::Unauthorized)?;
        let claims = self.tokens.verify_refresh(token)?;

        if !self.sessions.claim_if_active(claims.id).await? {
            tracing::warn!(
                user_id = %claims.uid,
                session_id = %claims.id,
                "refresh token reuse detected, revoking all active sessions"
            );
            // Containment must run before the rejection goes out. If it
            // fails the token still stays dead, but flag the gap loudly.
            if let Err(err) = self.sessions.revoke_all_active_for_user(claims.uid).await {
                tracing::error!(
                    user_id = %claims.uid,
                    error = %err,
                    "containment failed: could not revoke sessions after reuse"
                );
            }
            return Err(AuthError::Unauthorized);
        }

        let principal = self
            .principals
            .find_by_id(claims.uid)
            .await?
            .map(|user| Principal::from(&user))
            .ok_or(AuthError::Unauthorized)?;

        if self.policy == RotationPolicy::RevokeAllActive {
            self.sessions.revoke_all_active_for_user(claims.uid).await?;
        }

        tracing::info!(
            user_id = %claims.uid,
            session_id = %claims.id,
            "refresh token rotated"
        );

        self.issue(&principal).await
    }

    /// Verify an access token and return the principal it names.
    ///
    /// Purely cryptographic; no store round-trip.
    pub fn authenticate(&self, access_cookie: Option<&str>) -> Result<Principal, AuthError> {
        let token = access_cookie.ok_or(AuthError::Unauthorized)?;
        let claims = self.tokens.verify_access(token)?;

        Ok(Principal {
            id: claims.id,
            role: claims.role,
        })
    }

    /// Revoke every active session of the user. Idempotent.
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.sessions.revoke_all_active_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "revoked auth sessions");
        Ok(revoked)
    }

    /// Access token lifetime in seconds (for the cookie max-age)
    pub fn access_ttl_secs(&self) -> i64 {
        self.tokens.access_ttl_secs()
    }

    /// Refresh token lifetime in seconds (for the cookie max-age)
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.tokens.refresh_ttl_secs()
    }

    #[cfg(test)]
    pub(crate) fn token_service(&self) -> &TokenService {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::credentials::test_keys;
    use crate::core::auth::jwt::TokenConfig;
    use crate::core::db::models::UserRole;
    use crate::core::db::repositories::{InMemoryPrincipalStore, InMemorySessionStore};

    type TestService = AuthService<InMemoryPrincipalStore, InMemorySessionStore>;

    fn make_service(policy: RotationPolicy) -> (TestService, InMemorySessionStore) {
        let sessions = InMemorySessionStore::new();
        let service = AuthService::new(
            InMemoryPrincipalStore::new(),
            sessions.clone(),
            TokenService::new(test_keys::test_keyring(), TokenConfig::new()),
            policy,
        );
        (service, sessions)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Raj Mazumder".to_string(),
            email: email.to_string(),
            password: "it is secret".to_string(),
        }
    }

    fn login_request(email: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: "it is secret".to_string(),
        }
    }

    // ========================================================================
    // Validation Tests
    // ========================================================================

    #[test]
    fn test_validate_email() {
        assert!(TestService::validate_email("user@example.com").is_ok());
        assert!(TestService::validate_email("user+tag@example.co.uk").is_ok());

        assert!(TestService::validate_email("").is_err());
        assert!(TestService::validate_email("invalid").is_err());
        assert!(TestService::validate_email("@example.com").is_err());
        assert!(TestService::validate_email("nice@").is_err());
        assert!(TestService::validate_email("user@example").is_err());
        assert!(TestService::validate_email("user@@example.com").is_err());
        assert!(TestService::validate_email("user@.com").is_err());
        assert!(TestService::validate_email("user@example.").is_err());
    }

    #[test]
    fn test_validate_name_and_password() {
        assert!(TestService::validate_name("Raj").is_ok());
        assert!(matches!(
            TestService::validate_name("OK"),
            Err(AuthError::NameTooShort)
        ));

        assert!(TestService::validate_password("secret").is_ok());
        assert!(matches!(
            TestService::validate_password("nope!"),
            Err(AuthError::PasswordTooShort)
        ));
    }

    // ========================================================================
    // Registration and Login
    // ========================================================================

    #[tokio::test]
    async fn test_register_creates_one_active_session() {
        let (service, sessions) = make_service(RotationPolicy::default());

        let (principal, tokens) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        assert_eq!(principal.role, UserRole::Customer);
        assert!(tokens.session.is_active);
        assert_eq!(sessions.count_sessions().await.unwrap(), 1);
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let (service, _) = make_service(RotationPolicy::default());

        service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        let result = service.register(register_request("raj@example.com")).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_second_login_creates_second_session() {
        let (service, sessions) = make_service(RotationPolicy::default());

        let (principal, _) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();
        service.login(login_request("raj@example.com")).await.unwrap();

        assert_eq!(sessions.count_sessions().await.unwrap(), 2);
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email_look_alike() {
        let (service, _) = make_service(RotationPolicy::default());

        service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        let wrong_password = service
            .login(LoginRequest {
                email: "raj@example.com".to_string(),
                password: "not the secret".to_string(),
            })
            .await;
        let unknown_email = service.login(login_request("nobody@example.com")).await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
    }

    // ========================================================================
    // Rotation: single use, reuse containment, freshness
    // ========================================================================

    #[tokio::test]
    async fn test_rotate_succeeds_exactly_once_per_token() {
        let (service, _) = make_service(RotationPolicy::default());

        let (_, issued) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        assert!(service.rotate(Some(&issued.refresh_token)).await.is_ok());

        let replay = service.rotate(Some(&issued.refresh_token)).await;
        assert!(matches!(replay, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_rotation_walkthrough_two_devices_then_replay() {
        let (service, sessions) = make_service(RotationPolicy::default());

        // Register (device 1), then login again (device 2).
        let (principal, device1) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();
        let (_, device2) = service.login(login_request("raj@example.com")).await.unwrap();
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 2);

        // Rotate device 2: its row is consumed, a third row is created,
        // device 1 is untouched.
        let rotated = service.rotate(Some(&device2.refresh_token)).await.unwrap();
        assert_eq!(sessions.count_sessions().await.unwrap(), 3);
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 2);
        assert!(!sessions.get(device2.session.id).unwrap().is_active);
        assert!(sessions.get(device1.session.id).unwrap().is_active);

        // Replay device 2's consumed token: reuse. Everything active goes.
        let replay = service.rotate(Some(&device2.refresh_token)).await;
        assert!(matches!(replay, Err(AuthError::Unauthorized)));
        assert_eq!(sessions.count_sessions().await.unwrap(), 3);
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 0);
        assert!(!sessions.get(device1.session.id).unwrap().is_active);
        assert!(!sessions.get(rotated.session.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_rotate_returns_fresh_token_for_fresh_session() {
        let (service, _) = make_service(RotationPolicy::default());

        let (_, issued) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        let rotated = service.rotate(Some(&issued.refresh_token)).await.unwrap();

        assert_ne!(rotated.refresh_token, issued.refresh_token);
        assert_ne!(rotated.session.id, issued.session.id);

        let claims = service
            .token_service()
            .verify_refresh(&rotated.refresh_token)
            .unwrap();
        assert_eq!(claims.id, rotated.session.id);
    }

    #[tokio::test]
    async fn test_reuse_of_one_user_never_touches_another() {
        let (service, sessions) = make_service(RotationPolicy::default());

        let (user_a, a_tokens) = service
            .register(register_request("alice@example.com"))
            .await
            .unwrap();
        let (user_b, _) = service
            .register(register_request("bob@example.com"))
            .await
            .unwrap();

        // Consume then replay A's token.
        service.rotate(Some(&a_tokens.refresh_token)).await.unwrap();
        let _ = service.rotate(Some(&a_tokens.refresh_token)).await;

        assert_eq!(sessions.count_active_for_user(user_a.id).await.unwrap(), 0);
        assert_eq!(sessions.count_active_for_user(user_b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rotate_with_missing_or_garbage_token() {
        let (service, sessions) = make_service(RotationPolicy::default());

        service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            service.rotate(None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            service.rotate(Some("cool")).await,
            Err(AuthError::Unauthorized)
        ));

        // A token that never verified causes no state change.
        assert_eq!(sessions.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rotate_fails_closed_when_principal_is_gone() {
        let sessions = InMemorySessionStore::new();
        let principals = InMemoryPrincipalStore::new();
        let service = AuthService::new(
            principals.clone(),
            sessions.clone(),
            TokenService::new(test_keys::test_keyring(), TokenConfig::new()),
            RotationPolicy::default(),
        );

        let (principal, issued) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        principals.remove(principal.id);

        let result = service.rotate(Some(&issued.refresh_token)).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));

        // The presented grant was still consumed: fail closed, not open.
        assert!(!sessions.get(issued.session.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_revoke_all_policy_leaves_single_lineage() {
        let (service, sessions) = make_service(RotationPolicy::RevokeAllActive);

        let (principal, _) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();
        let (_, device2) = service.login(login_request("raj@example.com")).await.unwrap();

        let rotated = service.rotate(Some(&device2.refresh_token)).await.unwrap();

        // Only the replacement session survives under revoke-all.
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 1);
        assert!(sessions.get(rotated.session.id).unwrap().is_active);
    }

    // ========================================================================
    // AccessGate and Logout
    // ========================================================================

    #[tokio::test]
    async fn test_authenticate_roundtrip() {
        let (service, _) = make_service(RotationPolicy::default());

        let (principal, issued) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        let verified = service.authenticate(Some(&issued.access_token)).unwrap();
        assert_eq!(verified.id, principal.id);
        assert_eq!(verified.role, UserRole::Customer);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_missing_expired_and_foreign_tokens() {
        let (service, _) = make_service(RotationPolicy::default());

        assert!(matches!(
            service.authenticate(None),
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            service.authenticate(Some("cool")),
            Err(AuthError::Unauthorized)
        ));

        // Expired: signed with the right key but a past expiry.
        let expired_signer = TokenService::new(
            test_keys::test_keyring(),
            TokenConfig::new().access_ttl(-10),
        );
        let expired = expired_signer
            .sign_access(&Principal {
                id: Uuid::new_v4(),
                role: UserRole::Customer,
            })
            .unwrap();
        assert!(matches!(
            service.authenticate(Some(&expired)),
            Err(AuthError::Unauthorized)
        ));

        // Signed with a different key pair entirely.
        let foreign_signer =
            TokenService::new(test_keys::other_keyring(), TokenConfig::new());
        let foreign = foreign_signer
            .sign_access(&Principal {
                id: Uuid::new_v4(),
                role: UserRole::Admin,
            })
            .unwrap();
        assert!(matches!(
            service.authenticate(Some(&foreign)),
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, sessions) = make_service(RotationPolicy::default());

        let (principal, _) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();
        service.login(login_request("raj@example.com")).await.unwrap();

        assert_eq!(service.logout(principal.id).await.unwrap(), 2);
        assert_eq!(service.logout(principal.id).await.unwrap(), 0);
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_treated_as_reuse() {
        let (service, sessions) = make_service(RotationPolicy::default());

        let (principal, issued) = service
            .register(register_request("raj@example.com"))
            .await
            .unwrap();

        service.logout(principal.id).await.unwrap();

        let result = service.rotate(Some(&issued.refresh_token)).await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
        assert_eq!(sessions.count_active_for_user(principal.id).await.unwrap(), 0);
    }

    // ========================================================================
    // Rotation Policy Parsing
    // ========================================================================

    #[test]
    fn test_rotation_policy_from_str() {
        assert_eq!(
            "revoke-consumed".parse::<RotationPolicy>().unwrap(),
            RotationPolicy::RevokeConsumed
        );
        assert_eq!(
            "revoke-all".parse::<RotationPolicy>().unwrap(),
            RotationPolicy::RevokeAllActive
        );
        assert!("revoke-some".parse::<RotationPolicy>().is_err());
    }
}
