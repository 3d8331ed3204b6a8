//! Database module for Authgate
//!
//! Provides connectivity, models, and the persistence ports (with their
//! PostgreSQL and in-memory adapters) for the authentication core.

pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used items
pub use models::{Principal, Session, User, UserRole};
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations};
pub use repositories::{
    InMemoryPrincipalStore, InMemorySessionStore, NewUser, PgPrincipalStore, PgSessionStore,
    PrincipalStore, SessionStore, StoreError,
};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
