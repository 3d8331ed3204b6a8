//! Auth API endpoints
//!
//! REST surface for authentication:
//! - POST /api/auth/register - Register a new user
//! - POST /api/auth/login - Login and receive the cookie pair
//! - POST /api/auth/refresh - Rotate the refresh token
//! - GET /api/auth/whoami - Identify the caller from the access token
//! - POST /api/auth/logout - Revoke every active session
//!
//! Tokens travel exclusively in cookies. Every `Unauthorized` on the
//! refresh or protected paths also expires both cookies so clients stop
//! retrying with dead tokens.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use sqlx::PgPool;

use crate::core::auth::cookies::{
    ACCESS_TOKEN, REFRESH_TOKEN, clear_auth_cookies, set_auth_cookies,
};
use crate::core::auth::service::{AuthError, AuthService, LoginRequest, RegisterRequest};
use crate::core::db::models::Principal;
use crate::core::db::pool;
use crate::core::db::repositories::{PrincipalStore, SessionStore};

/// Application context assembled once at startup and shared by reference.
#[derive(Clone)]
pub struct AuthApiState<P, S> {
    pub auth: AuthService<P, S>,
}

/// API error response envelope
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    pub code: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Convert AuthError to an API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::EmailAlreadyExists => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
            AuthError::NameTooShort | AuthError::InvalidEmail | AuthError::PasswordTooShort => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AuthError::Store(_) | AuthError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR")
            }
        };

        let body = ApiError::new(self.to_string(), code);

        (status, Json(body)).into_response()
    }
}

/// Response for successful operations
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Response for whoami
#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub success: bool,
    pub message: String,
    pub data: Principal,
}

/// Create the auth API router
pub fn auth_api_router<P, S>(state: AuthApiState<P, S>) -> Router
where
    P: PrincipalStore + Clone + 'static,
    S: SessionStore + Clone + 'static,
{
    let state = Arc::new(state);

    Router::new()
        .route("/api/auth/register", post(register_handler::<P, S>))
        .route("/api/auth/login", post(login_handler::<P, S>))
        .route("/api/auth/refresh", post(refresh_handler::<P, S>))
        .route("/api/auth/whoami", get(whoami_handler::<P, S>))
        .route("/api/auth/logout", post(logout_handler::<P, S>))
        .with_state(state)
}

/// Create the health router
pub fn health_router(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(pool)
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(format!("Route not found: {uri}"), "NOT_FOUND")),
    )
}

/// Expire both token cookies on a 401 so the client stops retrying.
fn reject_cookies(jar: CookieJar, err: &AuthError) -> CookieJar {
    if matches!(err, AuthError::Unauthorized) {
        clear_auth_cookies(jar)
    } else {
        jar
    }
}

/// POST /api/auth/register
async fn register_handler<P, S>(
    State(state): State<Arc<AuthApiState<P, S>>>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<SuccessResponse>), AuthError>
where
    P: PrincipalStore,
    S: SessionStore,
{
    tracing::info!(email = %request.email, "registration attempt");

    let (_, tokens) = state.auth.register(request).await?;

    let jar = set_auth_cookies(
        jar,
        tokens.access_token,
        tokens.refresh_token,
        state.auth.access_ttl_secs(),
        state.auth.refresh_ttl_secs(),
    );

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SuccessResponse::new("User created successfully")),
    ))
}

/// POST /api/auth/login
async fn login_handler<P, S>(
    State(state): State<Arc<AuthApiState<P, S>>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SuccessResponse>), AuthError>
where
    P: PrincipalStore,
    S: SessionStore,
{
    tracing::info!(email = %request.email, "login attempt");

    let (_, tokens) = state.auth.login(request).await?;

    let jar = set_auth_cookies(
        jar,
        tokens.access_token,
        tokens.refresh_token,
        state.auth.access_ttl_secs(),
        state.auth.refresh_ttl_secs(),
    );

    Ok((jar, Json(SuccessResponse::new("User logged in successfully"))))
}

/// POST /api/auth/refresh
async fn refresh_handler<P, S>(
    State(state): State<Arc<AuthApiState<P, S>>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), (CookieJar, AuthError)>
where
    P: PrincipalStore,
    S: SessionStore,
{
    let refresh = jar.get(REFRESH_TOKEN).map(|cookie| cookie.value().to_owned());

    match state.auth.rotate(refresh.as_deref()).await {
        Ok(tokens) => {
            let jar = set_auth_cookies(
                jar,
                tokens.access_token,
                tokens.refresh_token,
                state.auth.access_ttl_secs(),
                state.auth.refresh_ttl_secs(),
            );
            Ok((jar, Json(SuccessResponse::new("Token successfully refreshed!"))))
        }
        Err(err) => Err((reject_cookies(jar, &err), err)),
    }
}

/// GET /api/auth/whoami
async fn whoami_handler<P, S>(
    State(state): State<Arc<AuthApiState<P, S>>>,
    jar: CookieJar,
) -> Result<Json<WhoamiResponse>, (CookieJar, AuthError)>
where
    P: PrincipalStore,
    S: SessionStore,
{
    let access = jar.get(ACCESS_TOKEN).map(|cookie| cookie.value().to_owned());

    match state.auth.authenticate(access.as_deref()) {
        Ok(principal) => Ok(Json(WhoamiResponse {
            success: true,
            message: "Authenticated".to_string(),
            data: principal,
        })),
        Err(err) => Err((reject_cookies(jar, &err), err)),
    }
}

/// POST /api/auth/logout
async fn logout_handler<P, S>(
    State(state): State<Arc<AuthApiState<P, S>>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), (CookieJar, AuthError)>
where
    P: PrincipalStore,
    S: SessionStore,
{
    let access = jar.get(ACCESS_TOKEN).map(|cookie| cookie.value().to_owned());

    match state.auth.authenticate(access.as_deref()) {
        Ok(principal) => match state.auth.logout(principal.id).await {
            Ok(_) => Ok((
                clear_auth_cookies(jar),
                Json(SuccessResponse::new("Successfully logged out!")),
            )),
            Err(err) => Err((jar, err)),
        },
        Err(err) => Err((reject_cookies(jar, &err), err)),
    }
}

/// GET /health
async fn health_handler(State(pool): State<PgPool>) -> Result<Json<SuccessResponse>, StatusCode> {
    match pool::health_check(&pool).await {
        Ok(()) => Ok(Json(SuccessResponse::new("OK"))),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
