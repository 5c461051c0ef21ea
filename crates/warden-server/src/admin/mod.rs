//! Admin API endpoints.
//!
//! # Endpoints
//!
//! All routes live under `/api/v1/admin` and require an authenticated caller
//! holding the admin role.
//!
//! - `GET /users` - Paginated, filtered user listing
//! - `GET /users/stats` - Aggregate user statistics (cached snapshot)
//! - `PATCH /users/{id}/activate` - Set status to `active`
//! - `PATCH /users/{id}/deactivate` - Set status to `inactive`
//! - `PATCH /users/{id}/suspend` - Set status to `suspended`

pub mod response;
pub mod state;
pub mod user;

pub use response::{ApiError, ApiResponse};
pub use state::AdminState;
pub use user::{activate_user, deactivate_user, list_users, suspend_user, user_stats};
