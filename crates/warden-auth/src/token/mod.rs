//! Bearer credential verification.
//!
//! Credentials are HMAC-signed JWTs issued by the identity provider. This
//! module only verifies them; issuing and key rotation happen elsewhere.

pub mod verifier;

pub use verifier::{AccessTokenClaims, TokenError, TokenVerifier};
