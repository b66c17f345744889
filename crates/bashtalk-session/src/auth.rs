//! The admin secret check.
//!
//! Privileged commands (`/clear_cache`, `/ban`) ask the user for the
//! administrator password. [`AuthGate`] stores only a SHA-256 digest of
//! the secret, set once at server start, and compares digests of attempts
//! against it in constant time.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::AuthError;

const DIGEST_LEN: usize = 32;

/// Verifies attempts against a stored administrator digest.
#[derive(Clone)]
pub struct AuthGate {
    digest: [u8; DIGEST_LEN],
}

impl AuthGate {
    /// Builds a gate from the plaintext secret. The plaintext is not kept.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            digest: sha256(secret),
        }
    }

    /// Builds a gate from a hex-encoded SHA-256 digest, as stored in
    /// configuration.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidDigest`] unless `encoded` is exactly 64
    /// hexadecimal characters (either case).
    pub fn from_digest_hex(encoded: &str) -> Result<Self, AuthError> {
        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(encoded.trim(), &mut digest)
            .map_err(|_| AuthError::InvalidDigest)?;
        Ok(Self { digest })
    }

    /// Returns `true` if `attempt` hashes to the stored digest.
    pub fn verify(&self, attempt: &str) -> bool {
        let candidate = sha256(attempt);
        // Fold every byte so timing doesn't reveal the matching prefix.
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Returns the stored digest as lowercase hex.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

fn sha256(input: &str) -> [u8; DIGEST_LEN] {
    Sha256::digest(input.as_bytes()).into()
}
