//! Principal store: user lookup and creation
//!
//! The core only ever reads `{id, role}` plus the password hash; everything
//! else on the row belongs to the persistence layer.

use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::User;
use crate::core::db::repositories::StoreError;

/// Parameters for creating a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Port for principal lookup and creation.
pub trait PrincipalStore: Send + Sync {
    /// Insert a new user with the default role.
    fn create(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Find a user by id.
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Find a user by unique email.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Total number of users. Observability and tests only.
    fn count_users(&self) -> impl Future<Output = Result<i64, StoreError>> + Send;
}

/// PostgreSQL-backed principal store
#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PrincipalStore for PgPrincipalStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
