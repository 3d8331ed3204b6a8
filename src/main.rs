use axum::Router;
use tower_http::trace::TraceLayer;

use authgate::core::auth::api::{AuthApiState, auth_api_router, health_router, not_found};
use authgate::core::auth::credentials::Keyring;
use authgate::core::auth::jwt::{TokenConfig, TokenService};
use authgate::core::auth::service::AuthService;
use authgate::core::config::Config;
use authgate::core::db::pool::{DbConfig, create_pool_with_migrations};
use authgate::core::db::repositories::{PgPrincipalStore, PgSessionStore};

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    // Key material is required before we can serve a single request.
    let keyring = match Keyring::load(
        &config.private_key_path,
        &config.public_key_path,
        &config.refresh_secret,
    ) {
        Ok(keyring) => keyring,
        Err(err) => {
            tracing::error!(error = %err, "failed to load signing key material");
            std::process::exit(1);
        }
    };

    let pool = match create_pool_with_migrations(&DbConfig::new(config.database_url.clone())).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to database");
            std::process::exit(1);
        }
    };

    let auth = AuthService::new(
        PgPrincipalStore::new(pool.clone()),
        PgSessionStore::new(pool.clone()),
        TokenService::new(keyring, TokenConfig::from_env()),
        config.rotation_policy,
    );

    let app = Router::new()
        .merge(auth_api_router(AuthApiState { auth }))
        .merge(health_router(pool))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http());

    tracing::info!(addr = %config.bind_addr, policy = ?config.rotation_policy, "listening");

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
