//! Authoritative session source trait.
//!
//! The source is the system of record for session validity. The resolver
//! consults it on every cache miss and notifies it of activity.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Return `Ok(None)` for unknown sessions rather than an error
//! - Reserve errors for transport or storage failures
//! - Be cheap to clone behind an `Arc` and safe to call concurrently

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::session::SessionRecord;

/// The system of record for session validity.
///
/// # Implementations
///
/// - PostgreSQL (in `warden-auth-postgres` crate)
/// - [`RemoteSessionSource`](crate::session::RemoteSessionSource), an HTTP
///   client for the identity service
///
/// # Example Implementation
///
/// ```ignore
/// use warden_auth::storage::SessionSource;
/// use warden_auth::session::SessionRecord;
/// use warden_auth::AuthResult;
///
/// struct InMemorySessionSource {
///     sessions: std::sync::RwLock<std::collections::HashMap<String, SessionRecord>>,
/// }
///
/// #[async_trait::async_trait]
/// impl SessionSource for InMemorySessionSource {
///     async fn find_by_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
///         Ok(self.sessions.read().unwrap().get(session_id).cloned())
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Finds a session by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached or read. An unknown
    /// session is `Ok(None)`.
    async fn find_by_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>>;

    /// Records that the session was used at `at`.
    ///
    /// Called from detached tasks; callers only log the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the update cannot be delivered.
    async fn update_activity(&self, session_id: &str, at: OffsetDateTime) -> AuthResult<()>;

    /// Short name of the variant, for logs.
    fn kind(&self) -> &'static str;
}
