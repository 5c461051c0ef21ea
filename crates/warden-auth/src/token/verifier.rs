//! HMAC access token verification.
//!
//! Accepts HS256, HS384 and HS512 tokens signed with a single shared secret.
//! Anything else is rejected before the signature is checked.
//!
//! ## Example
//!
//! ```ignore
//! use warden_auth::token::TokenVerifier;
//!
//! let verifier = TokenVerifier::new("shared-secret");
//! let claims = verifier.verify(bearer)?;
//! assert_eq!(claims.token_type, "access");
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The only credential kind accepted on API requests.
pub const ACCESS_TOKEN_KIND: &str = "access";

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced by [`TokenVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is empty or not a structurally valid JWT.
    #[error("Missing or malformed credential")]
    MissingCredential,

    /// The signature does not match, or the token uses a non-HMAC algorithm.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The `exp` claim is in the past.
    #[error("Token expired")]
    Expired,

    /// The token is validly shaped but is not an access token.
    #[error("Wrong credential kind: expected access, got '{kind}'")]
    WrongCredentialKind {
        /// The `tokenType` the token carried.
        kind: String,
    },

    /// The signature is valid but the claims could not be decoded.
    #[error("Malformed claims: {message}")]
    Malformed {
        /// Decoder message.
        message: String,
    },
}

impl TokenError {
    /// Returns `true` for signature or algorithm failures.
    #[must_use]
    pub fn is_signature_error(&self) -> bool {
        matches!(self, Self::InvalidSignature)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        // Header and payload are decoded before this conversion is reached,
        // so encoding failures here can only come from the signature segment.
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Base64(_) => Self::InvalidSignature,
            ErrorKind::InvalidToken => Self::MissingCredential,
            ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::MissingRequiredClaim(_) => {
                Self::Malformed {
                    message: err.to_string(),
                }
            }
            _ => Self::Malformed {
                message: err.to_string(),
            },
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// Subject user identifier.
    pub user_id: String,
    /// Session the token was issued for.
    pub session_id: String,
    /// User email at issue time.
    pub email: String,
    /// User role at issue time.
    pub role: String,
    /// Credential kind, `access` or `refresh`.
    pub token_type: String,
    /// Optional registered subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Deserialize)]
struct HeaderPeek {
    alg: String,
}

#[derive(Deserialize)]
struct KindPeek {
    #[serde(rename = "tokenType", default)]
    token_type: String,
}

// ============================================================================
// Verifier
// ============================================================================

/// Verifies bearer credentials against a shared HMAC secret.
///
/// Verification is pure: no I/O, no clock other than the system time used
/// for `exp`.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Non-access tokens are rejected as [`TokenError::WrongCredentialKind`]
    /// whether or not their signature is valid.
    ///
    /// # Errors
    ///
    /// See [`TokenError`] for the failure modes.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::MissingCredential);
        }

        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::MissingCredential);
        };

        let kind: KindPeek = peek_segment(payload)?;
        if kind.token_type != ACCESS_TOKEN_KIND {
            return Err(TokenError::WrongCredentialKind {
                kind: kind.token_type,
            });
        }

        let header: HeaderPeek = peek_segment(header)?;
        if !matches!(header.alg.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(TokenError::InvalidSignature);
        }

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

fn peek_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::MissingCredential)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::MissingCredential)
}

// ============================================================================
// Tests
// ============================================================================
