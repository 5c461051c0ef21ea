//! Login session storage.
//!
//! The `sessions` table is the system of record for session validity. The
//! identity provider writes it; this crate only reads rows and records
//! activity.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use warden_auth::session::SessionRecord;
use warden_auth::storage::SessionSource;
use warden_auth::AuthResult;

use crate::{PgPool, StorageError, StorageResult};

type SessionTuple = (
    String,
    String,
    bool,
    OffsetDateTime,
    OffsetDateTime,
    Option<OffsetDateTime>,
    OffsetDateTime,
);

fn record_from_tuple(row: SessionTuple) -> SessionRecord {
    SessionRecord {
        session_id: row.0,
        user_id: row.1,
        is_active: row.2,
        expires_at: row.3,
        created_at: row.4,
        logout_at: row.5,
        last_active_at: row.6,
    }
}

// =============================================================================
// Session Storage
// =============================================================================

/// Session storage operations.
pub struct SessionStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionStorage<'a> {
    /// Create a new session storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a session by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        let row: Option<SessionTuple> = query_as(
            r#"
            SELECT session_id, user_id, is_active, expires_at, created_at, logout_at, last_active_at
            FROM sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(record_from_tuple))
    }

    /// Set `last_active_at` for a session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no row matches, or an error if the update fails.
    pub async fn touch(&self, session_id: &str, at: OffsetDateTime) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE sessions
            SET last_active_at = $2
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .bind(at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("Session {session_id}")));
        }
        Ok(())
    }
}

// =============================================================================
// SessionSource Implementation
// =============================================================================

/// PostgreSQL variant of the authoritative session source.
#[derive(Debug, Clone)]
pub struct PostgresSessionSource {
    pool: Arc<PgPool>,
}

impl PostgresSessionSource {
    /// Create a new source over a shared pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn storage(&self) -> SessionStorage<'_> {
        SessionStorage::new(&self.pool)
    }
}

#[async_trait]
impl SessionSource for PostgresSessionSource {
    async fn find_by_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        self.storage()
            .find_by_id(session_id)
            .await
            .map_err(StorageError::into_auth_error)
    }

    async fn update_activity(&self, session_id: &str, at: OffsetDateTime) -> AuthResult<()> {
        self.storage()
            .touch(session_id, at)
            .await
            .map_err(StorageError::into_auth_error)
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}
