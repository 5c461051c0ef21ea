//! In-memory fakes for tests.
//!
//! Compiled for this crate's tests and for downstream crates that enable the
//! `testing` feature.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::activity::{ActivityError, MessageChannel};
use crate::error::{AuthError, AuthResult};
use crate::session::SessionRecord;
use crate::storage::{
    CacheError, CacheResult, SessionCache, SessionSource, User, UserDirectory, UserPage,
    UserQuery, UserStats, UserStatus,
};
use crate::token::AccessTokenClaims;

/// A usable session created an hour before `now` and expiring an hour after it.
#[must_use]
pub fn session(session_id: &str, user_id: &str, now: OffsetDateTime) -> SessionRecord {
    SessionRecord {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        is_active: true,
        expires_at: now + time::Duration::hours(1),
        created_at: now - time::Duration::hours(1),
        logout_at: None,
        last_active_at: now,
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Cache fake without TTL enforcement.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    failing: AtomicBool,
}

impl InMemoryCache {
    /// Stores a record as the resolver would.
    pub fn insert(&self, key: &str, record: &SessionRecord) {
        let body = serde_json::to_vec(record).unwrap_or_default();
        self.insert_raw(key, body);
    }

    /// Stores arbitrary bytes.
    pub fn insert_raw(&self, key: &str, body: Vec<u8>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (body, Duration::from_secs(60)));
        }
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    /// TTL recorded by the last write to `key`.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().ok()?.get(key).map(|(_, ttl)| *ttl)
    }

    /// Makes every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionCache for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache is down".to_string()));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(entries.get(key).map(|(body, _)| body.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache is down".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CacheError::Command(e.to_string()))?;
        entries.insert(key.to_string(), (value, ttl));
        Ok(())
    }
}

// =============================================================================
// Session Source
// =============================================================================

/// Authoritative source fake with call counters.
#[derive(Default)]
pub struct InMemorySessionSource {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    find_calls: AtomicUsize,
    activity_calls: AtomicUsize,
}

impl InMemorySessionSource {
    /// Adds or replaces a session.
    pub fn insert(&self, record: SessionRecord) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(record.session_id.clone(), record);
        }
    }

    /// Current stored copy of a session.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.lock().ok()?.get(session_id).cloned()
    }

    /// Makes `find_by_id` fail with `message`.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    /// Makes `find_by_id` sleep before answering.
    pub fn delay_by(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = Some(delay);
        }
    }

    /// Number of `find_by_id` calls so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_activity` calls so far.
    pub fn activity_calls(&self) -> usize {
        self.activity_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for InMemorySessionSource {
    async fn find_by_id(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(message) = failure {
            return Err(AuthError::storage(message));
        }

        Ok(self.get(session_id))
    }

    async fn update_activity(&self, session_id: &str, at: OffsetDateTime) -> AuthResult<()> {
        self.activity_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sessions) = self.sessions.lock() {
            if let Some(record) = sessions.get_mut(session_id) {
                record.last_active_at = at;
            }
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Message Channel
// =============================================================================

/// Channel fake that records messages, or fails every publish.
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<(String, String, Vec<u8>)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    /// A channel whose every publish fails.
    #[must_use]
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.failing.store(true, Ordering::SeqCst);
        channel
    }

    /// Published bodies, decoded as JSON.
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|(_, _, body)| serde_json::from_slice(body).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
    ) -> Result<(), ActivityError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ActivityError::channel("broker unreachable"));
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((exchange.to_string(), routing_key.to_string(), body));
        }
        Ok(())
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Signs an HS256 credential for `user_id`/`session_id` valid for ten minutes.
pub fn sign_token(
    secret: &str,
    user_id: &str,
    session_id: &str,
    role: &str,
    token_type: &str,
) -> String {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = AccessTokenClaims {
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        email: format!("{user_id}@example.com"),
        role: role.to_string(),
        token_type: token_type.to_string(),
        sub: None,
        exp: now + 600,
        iat: Some(now),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 signing with a byte secret cannot fail")
}

// =============================================================================
// User Directory
// =============================================================================

/// Builds an active user with the given role.
pub fn user(id: &str, role: &str, now: OffsetDateTime) -> User {
    User {
        id: id.to_string(),
        first_name: "Test".to_string(),
        last_name: id.to_string(),
        email: format!("{id}@example.com"),
        phone: None,
        role: role.to_string(),
        status: UserStatus::Active,
        is_email_verified: true,
        last_login_at: None,
        last_active_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Directory fake over a vector of users. Ignores ordering and search.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<Vec<User>>,
    stats_calls: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryUserDirectory {
    /// Adds a user.
    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.lock() {
            users.push(user);
        }
    }

    /// Current status of a stored user.
    pub fn status_of(&self, id: &str) -> Option<UserStatus> {
        self.users
            .lock()
            .ok()
            .and_then(|users| users.iter().find(|u| u.id == id).map(|u| u.status))
    }

    /// Number of times statistics were computed.
    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    /// Makes every call fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> AuthResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::storage("directory offline"));
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<User> {
        self.users.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn list(&self, query: &UserQuery) -> AuthResult<UserPage> {
        self.check()?;
        let matching: Vec<User> = self
            .snapshot()
            .into_iter()
            .filter(|u| query.role.as_deref().is_none_or(|r| u.role == r))
            .filter(|u| query.status.is_none_or(|s| u.status == s))
            .collect();
        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let users = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect();
        Ok(UserPage::new(users, total, query))
    }

    async fn stats(&self) -> AuthResult<UserStats> {
        self.check()?;
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let users = self.snapshot();
        let count = |pred: fn(&User) -> bool| {
            i64::try_from(users.iter().filter(|u| pred(u)).count()).unwrap_or(i64::MAX)
        };
        Ok(UserStats {
            total: count(|_| true),
            active: count(|u| u.status == UserStatus::Active),
            inactive: count(|u| u.status == UserStatus::Inactive),
            suspended: count(|u| u.status == UserStatus::Suspended),
            specialists: count(|u| u.role == crate::storage::user::roles::EXECUTOR),
            clients: count(|u| u.role == crate::storage::user::roles::CLIENT),
            new_this_month: count(|_| true),
            growth: Default::default(),
        })
    }

    async fn set_status(&self, user_id: &str, status: UserStatus) -> AuthResult<Option<User>> {
        self.check()?;
        let mut users = self
            .users
            .lock()
            .map_err(|_| AuthError::internal("user directory lock poisoned"))?;
        Ok(users.iter_mut().find(|u| u.id == user_id).map(|u| {
            u.status = status;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }
}
