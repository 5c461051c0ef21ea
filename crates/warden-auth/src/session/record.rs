//! Session record held by the authoritative source and mirrored in the cache.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Builds the cache key for a session.
///
/// The same scheme is used by every source variant.
#[must_use]
pub fn session_cache_key(user_id: &str, session_id: &str) -> String {
    format!("session:{user_id}:{session_id}")
}

/// Why a session record is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRejection {
    /// `is_active` is false.
    Inactive,
    /// The user logged out.
    LoggedOut,
    /// `expires_at` is not in the future.
    Expired,
}

impl SessionRejection {
    /// Short label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::LoggedOut => "logged_out",
            Self::Expired => "expired",
        }
    }
}

/// A login session as recorded by the identity provider.
///
/// Field names are snake_case on the wire. The PascalCase aliases accept
/// payloads from services that serialize the record without field tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(alias = "SessionID")]
    pub session_id: String,
    #[serde(alias = "UserID")]
    pub user_id: String,
    #[serde(alias = "IsActive")]
    pub is_active: bool,
    #[serde(alias = "ExpiresAt", with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(alias = "CreatedAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        alias = "LogoutAt",
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub logout_at: Option<OffsetDateTime>,
    #[serde(alias = "LastActiveAt", with = "time::serde::rfc3339")]
    pub last_active_at: OffsetDateTime,
}

impl SessionRecord {
    /// Returns the first reason the session is unusable at `now`, if any.
    ///
    /// Expiry is strict: a session whose `expires_at` equals `now` is expired.
    #[must_use]
    pub fn rejection_at(&self, now: OffsetDateTime) -> Option<SessionRejection> {
        if !self.is_active {
            Some(SessionRejection::Inactive)
        } else if self.logout_at.is_some() {
            Some(SessionRejection::LoggedOut)
        } else if now >= self.expires_at {
            Some(SessionRejection::Expired)
        } else {
            None
        }
    }

    /// Returns `true` if the session may authenticate a request at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        self.rejection_at(now).is_none()
    }

    /// The cache key for this record.
    #[must_use]
    pub fn cache_key(&self) -> String {
        session_cache_key(&self.user_id, &self.session_id)
    }
}
