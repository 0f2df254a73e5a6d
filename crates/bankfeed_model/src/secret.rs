//! Zeroizing secret wrapper.
//!
//! Credentials and webhook signing secrets must never reach logs or
//! telemetry. `Secret` zeroizes its backing storage on drop and redacts
//! itself from `Debug` output, so accidental `{:?}` formatting of a
//! containing struct cannot leak material.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An opaque secret value (credential blob or webhook signing secret).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret bytes for MAC computation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the hex-encoded SHA-256 of the secret, safe to persist and
    /// display for identification.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = Secret::new("tok_live_1234");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("tok_live"));
        assert_eq!(rendered, "Secret([redacted])");
    }

    #[test]
    fn hash_is_stable_and_not_the_secret() {
        let secret = Secret::new("whsec_abc");
        let hash = secret.sha256_hex();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, Secret::new("whsec_abc").sha256_hex());
        assert_ne!(hash, "whsec_abc");
    }
}
