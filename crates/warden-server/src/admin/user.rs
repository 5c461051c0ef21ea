//! User admin handlers.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use warden_auth::Authenticated;
use warden_auth::storage::{UserPage, UserQuery, UserStats, UserStatus};

use super::{AdminState, ApiError, ApiResponse};

// =============================================================================
// Query Parameters
// =============================================================================

/// Raw query string of `GET /users`.
///
/// Numbers are kept as strings so a malformed value falls back to its default
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn parse_int_param(name: &str, value: Option<&str>, default: i64) -> i64 {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(param = name, value = raw, "Invalid integer parameter, using default");
            default
        }),
    }
}

impl ListUsersParams {
    /// Validates and normalizes the parameters.
    pub fn to_query(&self) -> Result<UserQuery, ApiError> {
        UserQuery::from_raw(
            parse_int_param("page", self.page.as_deref(), 1),
            parse_int_param("limit", self.limit.as_deref(), 0),
            self.role.as_deref(),
            self.status.as_deref(),
            self.search.as_deref(),
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
        )
        .map_err(|e| ApiError::bad_request("Invalid query parameters", e.to_string()))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /users - List users.
///
/// Query parameters:
/// - `page`: 1-based page number (default: 1)
/// - `limit`: Page size (default: 20, max: 100)
/// - `role`: `admin`, `client` or `executor`
/// - `status`: `active`, `inactive` or `suspended`
/// - `search`: Case-insensitive match on first name, last name or email
/// - `sortBy`: `createdAt` (default), `email`, `firstName`, `lastName`, `lastActiveAt`
/// - `sortOrder`: `asc` or `desc` (default)
pub async fn list_users(
    State(state): State<AdminState>,
    Authenticated(admin): Authenticated,
    Query(params): Query<ListUsersParams>,
) -> Result<ApiResponse<UserPage>, ApiError> {
    let query = params.to_query()?;
    tracing::debug!(
        admin_user_id = %admin.user_id,
        page = query.page,
        limit = query.limit,
        role = ?query.role,
        status = ?query.status,
        "Listing users"
    );

    let page = state
        .within_budget(state.users.list(&query))
        .await?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list users");
            ApiError::internal("Failed to retrieve users", e.to_string())
        })?;

    tracing::info!(
        users_returned = page.users.len(),
        total_count = page.total_count,
        page = page.page,
        total_pages = page.total_pages,
        "Users listed"
    );
    Ok(ApiResponse::ok(page, "Users retrieved successfully"))
}

/// GET /users/stats - Aggregate user statistics.
///
/// Served from the cached snapshot when present.
pub async fn user_stats(
    State(state): State<AdminState>,
    Authenticated(admin): Authenticated,
) -> Result<ApiResponse<UserStats>, ApiError> {
    tracing::debug!(admin_user_id = %admin.user_id, admin_email = %admin.email, "User stats requested");

    if let Some(stats) = state.stats_cache.get().await {
        return Ok(ApiResponse::ok(
            stats,
            "User statistics retrieved successfully (from cache)",
        ));
    }

    let stats = state
        .within_budget(state.users.stats())
        .await?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to compute user statistics");
            ApiError::internal("Failed to retrieve user statistics", e.to_string())
        })?;

    state.stats_cache.save(&stats).await;
    Ok(ApiResponse::ok(stats, "User statistics retrieved successfully"))
}

/// PATCH /users/{id}/activate
pub async fn activate_user(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    update_status(&state, &id, UserStatus::Active, "User activated successfully").await
}

/// PATCH /users/{id}/deactivate
pub async fn deactivate_user(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    update_status(&state, &id, UserStatus::Inactive, "User deactivated successfully").await
}

/// PATCH /users/{id}/suspend
pub async fn suspend_user(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    update_status(&state, &id, UserStatus::Suspended, "User suspended successfully").await
}

async fn update_status(
    state: &AdminState,
    user_id: &str,
    status: UserStatus,
    success_message: &str,
) -> Result<ApiResponse<()>, ApiError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::bad_request(
            "User ID is required",
            "Please provide a valid user ID",
        ));
    }

    tracing::info!(user_id = %user_id, status = %status, "Updating user status");

    let updated = state
        .within_budget(state.users.set_status(user_id, status))
        .await?
        .map_err(|e| {
            tracing::error!(user_id = %user_id, status = %status, error = %e, "Failed to update user status");
            ApiError::internal("Failed to update user status", e.to_string())
        })?;

    match updated {
        Some(_) => Ok(ApiResponse::message(success_message)),
        None => Err(ApiError::not_found(
            "User not found",
            "No user found with the provided ID",
        )),
    }
}
