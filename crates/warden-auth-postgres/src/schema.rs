//! Table definitions.
//!
//! Statements are idempotent and run one at a time at startup.

use sqlx_core::query::query;

use crate::{PgPool, StorageResult};

/// DDL for the session and user tables.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id      TEXT PRIMARY KEY,
        user_id         TEXT NOT NULL,
        is_active       BOOLEAN NOT NULL DEFAULT TRUE,
        expires_at      TIMESTAMPTZ NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        logout_at       TIMESTAMPTZ,
        last_active_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id                 TEXT PRIMARY KEY,
        first_name         TEXT NOT NULL DEFAULT '',
        last_name          TEXT NOT NULL DEFAULT '',
        email              TEXT NOT NULL UNIQUE,
        phone              TEXT,
        role               TEXT NOT NULL,
        status             TEXT NOT NULL DEFAULT 'active',
        is_email_verified  BOOLEAN NOT NULL DEFAULT FALSE,
        last_login_at      TIMESTAMPTZ,
        last_active_at     TIMESTAMPTZ,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at         TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS users_role_status_idx ON users (role, status) WHERE deleted_at IS NULL",
];

/// Runs every statement in [`SCHEMA`].
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in SCHEMA {
        query(statement).execute(pool).await?;
    }
    tracing::debug!(statements = SCHEMA.len(), "Auth schema ensured");
    Ok(())
}
