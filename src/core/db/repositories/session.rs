//! Session store: refresh-token grant rows and their rotation state
//!
//! Each row records one outstanding refresh-token grant. The token itself is
//! never stored; the signed claim carries the row id. Revocation flips
//! `is_active` and must be expressed as a single conditional statement:
//! `claim_if_active` is the only concurrency-control primitive the rotation
//! state machine has, and splitting it into a read followed by a write would
//! let two concurrent rotations both observe an active row.

use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::Session;
use crate::core::db::repositories::StoreError;

/// Port for session-row persistence.
pub trait SessionStore: Send + Sync {
    /// Insert a new active session row for the user.
    fn create(&self, user_id: Uuid) -> impl Future<Output = Result<Session, StoreError>> + Send;

    /// Atomically consume the row: set `is_active = false` iff it is
    /// currently active. Returns `true` iff this call flipped the flag.
    fn claim_if_active(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Revoke every active session of the user in one bulk statement.
    /// Returns the number of rows revoked.
    fn revoke_all_active_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Total number of session rows ever issued. Observability and tests only.
    fn count_sessions(&self) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Number of currently active sessions for the user.
    fn count_active_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;
}

/// PostgreSQL-backed session store
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<Session, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id)
            VALUES ($1)
            RETURNING id, user_id, is_active, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn claim_if_active(&self, session_id: Uuid) -> Result<bool, StoreError> {
        // Single-statement compare-and-swap on is_active.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_active_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_sessions(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn count_active_for_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE user_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
