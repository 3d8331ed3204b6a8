//! Persistence ports for Authgate
//!
//! The core consumes exactly two narrow ports: `PrincipalStore` for user
//! lookup/creation and `SessionStore` for refresh-token grant rows. Any
//! storage engine can stand behind them as long as `claim_if_active` and
//! `revoke_all_active_for_user` are true atomic operations.

pub mod memory;
pub mod session;
pub mod user;

pub use memory::{InMemoryPrincipalStore, InMemorySessionStore};
pub use session::{PgSessionStore, SessionStore};
pub use user::{NewUser, PgPrincipalStore, PrincipalStore};

/// Persistence failure surfaced through a port.
///
/// Transient; callers may retry under their own policy, the core never
/// retries silently.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
