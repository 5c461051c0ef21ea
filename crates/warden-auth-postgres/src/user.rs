//! User directory storage.
//!
//! Backs the admin listing, statistics and status routes. Soft-deleted rows
//! (`deleted_at IS NOT NULL`) are invisible to every query.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use warden_auth::storage::{
    GrowthStats, SortOrder, User, UserDirectory, UserPage, UserQuery, UserSortField, UserStats,
    UserStatus, percentage_growth,
};
use warden_auth::AuthResult;

use crate::{PgPool, StorageError, StorageResult};

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone, role, status, \
     is_email_verified, last_login_at, last_active_at, created_at, updated_at";

type UserTuple = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    bool,
    Option<OffsetDateTime>,
    Option<OffsetDateTime>,
    OffsetDateTime,
    OffsetDateTime,
);

fn user_from_tuple(row: UserTuple) -> StorageResult<User> {
    let status = row
        .6
        .parse::<UserStatus>()
        .map_err(|e| StorageError::invalid_input(format!("user {}: {e}", row.0)))?;
    Ok(User {
        id: row.0,
        first_name: row.1,
        last_name: row.2,
        email: row.3,
        phone: row.4,
        role: row.5,
        status,
        is_email_verified: row.7,
        last_login_at: row.8,
        last_active_at: row.9,
        created_at: row.10,
        updated_at: row.11,
    })
}

// =============================================================================
// Query Building
// =============================================================================

/// WHERE clause and its positional arguments for a listing query.
#[derive(Debug, Default, PartialEq, Eq)]
struct UserFilter {
    clause: String,
    args: Vec<String>,
}

impl UserFilter {
    fn from_query(query: &UserQuery) -> Self {
        let mut conditions = vec!["deleted_at IS NULL".to_string()];
        let mut args = Vec::new();

        if let Some(role) = &query.role {
            args.push(role.clone());
            conditions.push(format!("role = ${}", args.len()));
        }
        if let Some(status) = query.status {
            args.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", args.len()));
        }
        if let Some(search) = &query.search {
            args.push(format!("%{}%", escape_like(search)));
            let n = args.len();
            conditions.push(format!(
                "(first_name ILIKE ${n} OR last_name ILIKE ${n} OR email ILIKE ${n})"
            ));
        }

        Self {
            clause: conditions.join(" AND "),
            args,
        }
    }
}

/// Escapes LIKE wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn order_clause(field: UserSortField, order: SortOrder) -> String {
    let column = match field {
        UserSortField::CreatedAt => "created_at",
        UserSortField::Email => "email",
        UserSortField::FirstName => "first_name",
        UserSortField::LastName => "last_name",
        UserSortField::LastActiveAt => "last_active_at",
    };
    let direction = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    // Tie-break on id so pages are stable.
    format!("{column} {direction} NULLS LAST, id ASC")
}

// =============================================================================
// User Storage
// =============================================================================

/// User storage operations.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    /// Create a new user storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Count users matching the query filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self, query: &UserQuery) -> StorageResult<i64> {
        let filter = UserFilter::from_query(query);
        let sql = format!("SELECT COUNT(*) FROM users WHERE {}", filter.clause);

        let mut count = query_scalar::<_, i64>(&sql);
        for arg in &filter.args {
            count = count.bind(arg.clone());
        }
        Ok(count.fetch_one(self.pool).await?)
    }

    /// Fetch one page of users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row holds an
    /// unknown status.
    pub async fn find_page(&self, query: &UserQuery) -> StorageResult<Vec<User>> {
        let filter = UserFilter::from_query(query);
        let n = filter.args.len();
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            filter.clause,
            order_clause(query.sort_by, query.sort_order),
            n + 1,
            n + 2,
        );

        let mut rows = query_as::<_, UserTuple>(&sql);
        for arg in &filter.args {
            rows = rows.bind(arg.clone());
        }
        let rows = rows
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(user_from_tuple).collect()
    }

    /// Aggregate counts over all visible users.
    ///
    /// The previous-period figures cover users created before the start of
    /// the current month.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self) -> StorageResult<UserStats> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64, i64, i64) = query_as(
            r#"
            WITH bounds AS (SELECT date_trunc('month', NOW()) AS month_start)
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE status = 'inactive'),
                COUNT(*) FILTER (WHERE status = 'suspended'),
                COUNT(*) FILTER (WHERE role = 'executor'),
                COUNT(*) FILTER (WHERE role = 'client'),
                COUNT(*) FILTER (WHERE created_at >= bounds.month_start),
                COUNT(*) FILTER (WHERE created_at < bounds.month_start),
                COUNT(*) FILTER (WHERE created_at < bounds.month_start AND status = 'active'),
                COUNT(*) FILTER (WHERE created_at < bounds.month_start AND role = 'executor'),
                COUNT(*) FILTER (WHERE created_at < bounds.month_start AND role = 'client')
            FROM users, bounds
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        let (total, active, inactive, suspended, specialists, clients, new_this_month) =
            (row.0, row.1, row.2, row.3, row.4, row.5, row.6);
        let (prev_total, prev_active, prev_specialists, prev_clients) =
            (row.7, row.8, row.9, row.10);

        Ok(UserStats {
            total,
            active,
            inactive,
            specialists,
            clients,
            suspended,
            new_this_month,
            growth: GrowthStats {
                total: percentage_growth(prev_total, total),
                active: percentage_growth(prev_active, active),
                specialists: percentage_growth(prev_specialists, specialists),
                clients: percentage_growth(prev_clients, clients),
            },
        })
    }

    /// Set a user's status, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_status(&self, user_id: &str, status: UserStatus) -> StorageResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLUMNS}"
        );
        let row: Option<UserTuple> = query_as(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .fetch_optional(self.pool)
            .await?;

        row.map(user_from_tuple).transpose()
    }
}

// =============================================================================
// UserDirectory Implementation
// =============================================================================

/// PostgreSQL implementation of the admin user directory.
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    /// Create a new directory over a shared pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn storage(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn list(&self, query: &UserQuery) -> AuthResult<UserPage> {
        let storage = self.storage();
        let total_count = storage
            .count(query)
            .await
            .map_err(StorageError::into_auth_error)?;
        let users = storage
            .find_page(query)
            .await
            .map_err(StorageError::into_auth_error)?;

        tracing::debug!(
            count = users.len(),
            total = total_count,
            page = query.page,
            limit = query.limit,
            "Retrieved users"
        );
        Ok(UserPage::new(users, total_count, query))
    }

    async fn stats(&self) -> AuthResult<UserStats> {
        self.storage()
            .stats()
            .await
            .map_err(StorageError::into_auth_error)
    }

    async fn set_status(&self, user_id: &str, status: UserStatus) -> AuthResult<Option<User>> {
        let user = self
            .storage()
            .set_status(user_id, status)
            .await
            .map_err(StorageError::into_auth_error)?;
        if user.is_some() {
            tracing::info!(user_id = %user_id, status = %status, "User status updated");
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_without_criteria() {
        let filter = UserFilter::from_query(&UserQuery::default());
        assert_eq!(filter.clause, "deleted_at IS NULL");
        assert!(filter.args.is_empty());
    }

    #[test]
    fn test_filter_numbers_arguments_in_order() {
        let query = UserQuery::from_raw(
            1,
            20,
            Some("client"),
            Some("suspended"),
            Some("ann"),
            None,
            None,
        )
        .unwrap();
        let filter = UserFilter::from_query(&query);

        assert_eq!(
            filter.clause,
            "deleted_at IS NULL AND role = $1 AND status = $2 AND \
             (first_name ILIKE $3 OR last_name ILIKE $3 OR email ILIKE $3)"
        );
        assert_eq!(filter.args, vec!["client", "suspended", "%ann%"]);
    }

    #[test]
    fn test_search_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_order_clause() {
        assert_eq!(
            order_clause(UserSortField::CreatedAt, SortOrder::Desc),
            "created_at DESC NULLS LAST, id ASC"
        );
        assert_eq!(
            order_clause(UserSortField::LastActiveAt, SortOrder::Asc),
            "last_active_at ASC NULLS LAST, id ASC"
        );
    }

    #[test]
    fn test_user_from_tuple_rejects_unknown_status() {
        let now = OffsetDateTime::now_utc();
        let row: UserTuple = (
            "u1".into(),
            "Ann".into(),
            "Lee".into(),
            "ann@example.com".into(),
            None,
            "client".into(),
            "banned".into(),
            true,
            None,
            None,
            now,
            now,
        );
        let err = user_from_tuple(row).unwrap_err();
        assert!(err.is_client_error());
    }
}
