//! Authentication and authorization error types.
//!
//! Every rejection produced by the request pipeline is an [`AuthError`]. The
//! HTTP mapping lives in [`crate::middleware::error`].

use std::fmt;

/// Errors that can occur while authenticating or authorizing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer credential was presented, or the header was not a bearer header.
    #[error("Missing credential")]
    MissingCredential,

    /// The credential failed verification (signature, expiry, kind or shape).
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Description of why the credential was rejected.
        message: String,
    },

    /// The session referenced by the credential is no longer usable.
    #[error("Session expired")]
    SessionExpired,

    /// The authoritative session lookup failed or exceeded the request deadline.
    #[error("Session lookup failed: {message}")]
    SessionLookupFailed {
        /// Description of the underlying failure.
        message: String,
    },

    /// A role-gated route was reached without an authenticated identity.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The authenticated identity does not hold the required role.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// An error occurred while reading or writing durable auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidCredential` error.
    #[must_use]
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates a new `SessionLookupFailed` error.
    #[must_use]
    pub fn session_lookup_failed(message: impl Into<String>) -> Self {
        Self::SessionLookupFailed {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is caused by the caller (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::InvalidCredential { .. }
                | Self::SessionExpired
                | Self::AuthenticationRequired
                | Self::Forbidden { .. }
        )
    }

    /// Returns `true` if this error is caused by the server (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if the caller's identity could not be established.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::InvalidCredential { .. }
                | Self::SessionExpired
                | Self::AuthenticationRequired
        )
    }

    /// Returns `true` if the identity was established but lacks permission.
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredential => ErrorCategory::Credential,
            Self::InvalidCredential { .. } => ErrorCategory::Credential,
            Self::SessionExpired => ErrorCategory::Session,
            Self::SessionLookupFailed { .. } => ErrorCategory::Infrastructure,
            Self::AuthenticationRequired => ErrorCategory::Authentication,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of authentication/authorization errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential errors (missing, malformed, bad signature, expired).
    Credential,
    /// The session behind a valid credential is unusable.
    Session,
    /// No identity on a route that requires one.
    Authentication,
    /// Permission checks.
    Authorization,
    /// Cache, store or remote service failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => write!(f, "credential"),
            Self::Session => write!(f, "session"),
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result type for pipeline operations.
pub type AuthResult<T> = Result<T, AuthError>;
