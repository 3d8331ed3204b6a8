//! In-memory store adapters
//!
//! Back the same ports as the PostgreSQL adapters with `DashMap`s, so the
//! rotation state machine can be exercised without a database. A `get_mut`
//! guard is exclusive per key, which gives `claim_if_active` the same
//! compare-and-swap semantics as the SQL conditional update.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::core::db::models::{Session, User};
use crate::core::db::repositories::{NewUser, PrincipalStore, SessionStore, StoreError};

/// In-memory principal store
#[derive(Clone, Default)]
pub struct InMemoryPrincipalStore {
    users: Arc<DashMap<Uuid, User>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user. Models principal deletion by the owning layer.
    pub fn remove(&self, id: Uuid) -> Option<User> {
        self.users.remove(&id).map(|(_, user)| user)
    }
}

impl PrincipalStore for InMemoryPrincipalStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.email == email)
            .map(|entry| entry.value().clone()))
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.users.len() as i64)
    }
}

/// In-memory session store
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a row, for assertions in tests.
    pub fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: Uuid) -> Result<Session, StoreError> {
        let now = Utc::now();
        let row = Session {
            id: Uuid::new_v4(),
            user_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn claim_if_active(&self, session_id: Uuid) -> Result<bool, StoreError> {
        // The guard is held for the whole check-and-set.
        match self.sessions.get_mut(&session_id) {
            Some(mut row) if row.is_active => {
                row.is_active = false;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_active_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut revoked = 0;
        for mut entry in self.sessions.iter_mut() {
            if entry.user_id == user_id && entry.is_active {
                entry.is_active = false;
                entry.updated_at = Utc::now();
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn count_sessions(&self) -> Result<i64, StoreError> {
        Ok(self.sessions.len() as i64)
    }

    async fn count_active_for_user(&self, user_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.is_active)
            .count() as i64)
    }
}
