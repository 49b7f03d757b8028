//! Request Signing
//!
//! Computes the authentication block a `user` subscription carries. The
//! feed verifies identities the same way as its REST API: an HMAC-SHA256
//! over `timestamp + method + path + body`, keyed by the base64-decoded
//! API secret, sent base64-encoded alongside the key and passphrase.
//!
//! The subscription request signs a `GET` of [`VERIFY_PATH`] with an
//! empty body.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::subscription::UserIdentity;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Constants
// =============================================================================

/// HTTP verb of the identity verification request.
pub const VERIFY_METHOD: &str = "GET";

/// Resource path of the identity verification request.
pub const VERIFY_PATH: &str = "/users/self/verify";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The secret is not valid base64.
    #[error("secret is not valid base64: {0}")]
    InvalidSecret(String),
}

// =============================================================================
// Clock
// =============================================================================

/// Source of Unix timestamps for signatures.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn unix_seconds(&self) -> i64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn unix_seconds(&self) -> i64 {
        self.0
    }
}

// =============================================================================
// Auth Block
// =============================================================================

/// Authentication fields attached to one subscribe request.
///
/// Computed once per request and never reused for another connection.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthBlock {
    /// API key.
    pub key: String,
    /// API passphrase.
    pub passphrase: String,
    /// Unix seconds, decimal.
    pub timestamp: String,
    /// Base64 HMAC-SHA256 signature.
    pub signature: String,
}

impl fmt::Debug for AuthBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthBlock")
            .field("key", &self.key)
            .field("passphrase", &"[REDACTED]")
            .field("timestamp", &self.timestamp)
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Signing
// =============================================================================

/// Sign `timestamp + method + path` (empty body) with a base64 secret.
///
/// # Errors
///
/// Returns [`SignerError::InvalidSecret`] if the secret does not decode.
pub fn sign(
    secret_b64: &str,
    method: &str,
    path: &str,
    timestamp: &str,
) -> Result<String, SignerError> {
    let secret = STANDARD
        .decode(secret_b64)
        .map_err(|e| SignerError::InvalidSecret(e.to_string()))?;

    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|e| SignerError::InvalidSecret(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Produces [`AuthBlock`]s with timestamps from a [`Clock`].
#[derive(Debug, Clone, Default)]
pub struct Signer<C = SystemClock> {
    clock: C,
}

impl<C: Clock> Signer<C> {
    /// Create a signer reading time from `clock`.
    #[must_use]
    pub const fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Build a fresh auth block for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError`] if the identity's secret cannot be used.
    pub fn authenticate(&self, identity: &UserIdentity) -> Result<AuthBlock, SignerError> {
        let timestamp = self.clock.unix_seconds().to_string();
        let signature = sign(&identity.secret, VERIFY_METHOD, VERIFY_PATH, &timestamp)?;

        Ok(AuthBlock {
            key: identity.key.clone(),
            passphrase: identity.passphrase.clone(),
            timestamp,
            signature,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
