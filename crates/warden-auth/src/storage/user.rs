//! Admin user directory.
//!
//! The directory backs the admin route group: paginated listing, aggregate
//! statistics and account status changes. Storage implementations live in
//! `warden-auth-postgres`.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;

/// Known user roles.
pub mod roles {
    /// Administrators, the only role admitted to the admin routes.
    pub const ADMIN: &str = "admin";
    /// Customers.
    pub const CLIENT: &str = "client";
    /// Service providers, reported as "specialists" in statistics.
    pub const EXECUTOR: &str = "executor";

    /// All roles accepted as a listing filter.
    pub const ALL: [&str; 3] = [ADMIN, CLIENT, EXECUTOR];
}

/// Default page size when the caller asks for none.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// User Status
// =============================================================================

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    /// Returns the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = UserQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(UserQueryError::InvalidStatus(other.to_string())),
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A user profile as exposed to administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: String,
    pub status: UserStatus,
    pub is_email_verified: bool,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_active_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Returns `true` if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Returns `true` if the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate counts over all non-deleted users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub specialists: i64,
    pub clients: i64,
    pub suspended: i64,
    pub new_this_month: i64,
    pub growth: GrowthStats,
}

/// Month-over-month growth in percent, rounded to one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthStats {
    pub total: f64,
    pub active: f64,
    pub specialists: f64,
    pub clients: f64,
}

/// Percentage growth from `previous` to `current`.
///
/// Growth from zero is reported as 100% when anything was added, 0% otherwise.
#[must_use]
pub fn percentage_growth(previous: i64, current: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    let growth = (current - previous) as f64 / previous as f64 * 100.0;
    (growth * 10.0).round() / 10.0
}

// =============================================================================
// Listing
// =============================================================================

/// Errors raised while validating a listing query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserQueryError {
    #[error("invalid role filter: {0}")]
    InvalidRole(String),

    #[error("invalid status filter: {0}")]
    InvalidStatus(String),
}

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSortField {
    #[default]
    CreatedAt,
    Email,
    FirstName,
    LastName,
    LastActiveAt,
}

impl UserSortField {
    /// Parses the camelCase name used in query strings. Unknown names yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(Self::CreatedAt),
            "email" => Some(Self::Email),
            "firstName" => Some(Self::FirstName),
            "lastName" => Some(Self::LastName),
            "lastActiveAt" => Some(Self::LastActiveAt),
            _ => None,
        }
    }
}

/// Listing direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parses `asc`/`desc` case-insensitively. Anything else is descending.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// A validated, normalized listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: u32,
    pub limit: u32,
    pub role: Option<String>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
    pub sort_by: UserSortField,
    pub sort_order: SortOrder,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            role: None,
            status: None,
            search: None,
            sort_by: UserSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl UserQuery {
    /// Builds a query from raw request values.
    ///
    /// Page and limit are clamped into range. Empty filters are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`UserQueryError`] for an unknown role or status filter.
    pub fn from_raw(
        page: i64,
        limit: i64,
        role: Option<&str>,
        status: Option<&str>,
        search: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<Self, UserQueryError> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        let role = match non_empty(role) {
            Some(role) if roles::ALL.contains(&role) => Some(role.to_string()),
            Some(role) => return Err(UserQueryError::InvalidRole(role.to_string())),
            None => None,
        };
        let status = non_empty(status).map(UserStatus::from_str).transpose()?;

        Ok(Self {
            page: u32::try_from(page.max(1)).unwrap_or(u32::MAX),
            limit: if limit <= 0 {
                DEFAULT_PAGE_LIMIT
            } else {
                u32::try_from(limit.min(i64::from(MAX_PAGE_LIMIT))).unwrap_or(MAX_PAGE_LIMIT)
            },
            role,
            status,
            search: non_empty(search).map(str::to_string),
            sort_by: non_empty(sort_by)
                .and_then(UserSortField::parse)
                .unwrap_or_default(),
            sort_order: non_empty(sort_order)
                .map(SortOrder::parse)
                .unwrap_or_default(),
        })
    }

    /// Rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<User>,
    pub total_count: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl UserPage {
    /// Assembles a page, deriving `total_pages` from the count.
    #[must_use]
    pub fn new(users: Vec<User>, total_count: i64, query: &UserQuery) -> Self {
        let limit = i64::from(query.limit.max(1));
        let total_pages = (total_count.max(0) + limit - 1) / limit;
        Self {
            users,
            total_count,
            page: query.page,
            limit: query.limit,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// Storage for the admin user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Lists users matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self, query: &UserQuery) -> AuthResult<UserPage>;

    /// Computes aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn stats(&self) -> AuthResult<UserStats>;

    /// Sets the status of a user and returns the updated profile.
    ///
    /// Returns `Ok(None)` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_status(&self, user_id: &str, status: UserStatus) -> AuthResult<Option<User>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_growth() {
        assert_eq!(percentage_growth(0, 0), 0.0);
        assert_eq!(percentage_growth(0, 5), 100.0);
        assert_eq!(percentage_growth(10, 15), 50.0);
        assert_eq!(percentage_growth(3, 2), -33.3);
    }

    #[test]
    fn test_query_defaults_and_clamping() {
        let query = UserQuery::from_raw(0, 0, None, None, None, None, None).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(query.sort_by, UserSortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);

        let query = UserQuery::from_raw(3, 500, None, None, None, None, None).unwrap();
        assert_eq!(query.limit, MAX_PAGE_LIMIT);
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn test_query_filters() {
        let query = UserQuery::from_raw(
            1,
            10,
            Some("executor"),
            Some("suspended"),
            Some("  ann "),
            Some("email"),
            Some("ASC"),
        )
        .unwrap();
        assert_eq!(query.role.as_deref(), Some("executor"));
        assert_eq!(query.status, Some(UserStatus::Suspended));
        assert_eq!(query.search.as_deref(), Some("ann"));
        assert_eq!(query.sort_by, UserSortField::Email);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_blank_filters_are_dropped() {
        let query =
            UserQuery::from_raw(1, 10, Some("  "), Some(""), Some(" \t"), Some(" "), None).unwrap();
        assert_eq!(query.role, None);
        assert_eq!(query.status, None);
        assert_eq!(query.search, None);
        assert_eq!(query.sort_by, UserSortField::CreatedAt);
    }

    #[test]
    fn test_query_rejects_unknown_filters() {
        assert_eq!(
            UserQuery::from_raw(1, 10, Some("root"), None, None, None, None),
            Err(UserQueryError::InvalidRole("root".to_string()))
        );
        assert!(matches!(
            UserQuery::from_raw(1, 10, None, Some("banned"), None, None, None),
            Err(UserQueryError::InvalidStatus(_))
        ));
        assert!(UserQuery::from_raw(1, 10, Some(""), Some(" "), None, None, None).is_ok());
    }

    #[test]
    fn test_page_total_pages() {
        let query = UserQuery {
            limit: 20,
            ..Default::default()
        };
        assert_eq!(UserPage::new(Vec::new(), 0, &query).total_pages, 0);
        assert_eq!(UserPage::new(Vec::new(), 20, &query).total_pages, 1);
        assert_eq!(UserPage::new(Vec::new(), 41, &query).total_pages, 3);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&UserStatus::Suspended).unwrap(),
            "\"suspended\""
        );
        assert_eq!("inactive".parse::<UserStatus>(), Ok(UserStatus::Inactive));
    }
}
