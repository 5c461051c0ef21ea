//! Admin API state.

use std::sync::Arc;
use std::time::Duration;

use warden_auth::{Deadline, UserDirectory};

use super::ApiError;
use crate::cache::UserStatsCache;

// =============================================================================
// Admin State
// =============================================================================

/// Application state for admin endpoints.
///
/// Included in the application state and made available to admin handlers
/// via `FromRef`.
#[derive(Clone)]
pub struct AdminState {
    /// User directory backing every admin route.
    pub users: Arc<dyn UserDirectory>,

    /// Cached statistics snapshot.
    pub stats_cache: UserStatsCache,

    /// Budget for a single admin request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminState")
            .field("stats_cache", &self.stats_cache)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AdminState {
    /// Creates a new admin state.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        stats_cache: UserStatsCache,
        request_timeout: Duration,
    ) -> Self {
        Self {
            users,
            stats_cache,
            request_timeout,
        }
    }

    /// Runs `fut` within the request budget.
    pub(crate) async fn within_budget<F: std::future::Future>(
        &self,
        fut: F,
    ) -> Result<F::Output, ApiError> {
        Deadline::after(self.request_timeout)
            .run(fut)
            .await
            .map_err(|_| ApiError::internal("Request timed out", "The user directory did not respond in time"))
    }
}
