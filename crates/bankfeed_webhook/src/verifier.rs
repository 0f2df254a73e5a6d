//! Webhook authentication.
//!
//! Verification covers the exact unparsed request body: the HMAC is
//! computed over `"<timestamp>.<raw_body>"`, so the caller must hand over
//! the bytes as received on the wire.

use crate::error::{WebhookError, WebhookResult};
use crate::event::WebhookEvent;
use crate::signature::SignatureHeader;
use bankfeed_model::Secret;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default staleness tolerance in seconds.
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

/// Verifies inbound push notifications.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    tolerance_seconds: i64,
}

impl WebhookVerifier {
    /// Creates a verifier with the default tolerance window.
    pub fn new() -> Self {
        Self {
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
        }
    }

    /// Sets the staleness tolerance.
    pub fn with_tolerance_seconds(mut self, tolerance_seconds: i64) -> Self {
        self.tolerance_seconds = tolerance_seconds;
        self
    }

    /// Rejects timestamps outside the tolerance window, in either
    /// direction. Runs before signature verification: a stale delivery is
    /// rejected even when its signature would verify.
    pub fn check_timestamp(&self, header: &SignatureHeader, now_unix: i64) -> WebhookResult<()> {
        let age_seconds = (now_unix - header.timestamp).abs();
        if age_seconds > self.tolerance_seconds {
            return Err(WebhookError::StaleTimestamp { age_seconds });
        }
        Ok(())
    }

    /// Recomputes the HMAC and accepts if it matches any provided
    /// signature, in constant time.
    pub fn verify_signature(
        &self,
        raw_body: &[u8],
        header: &SignatureHeader,
        secret: &Secret,
    ) -> WebhookResult<()> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        let expected = mac.finalize().into_bytes();

        for signature in &header.signatures {
            if let Ok(candidate) = hex::decode(signature) {
                if bool::from(candidate.as_slice().ct_eq(expected.as_slice())) {
                    return Ok(());
                }
            }
        }
        Err(WebhookError::InvalidSignature)
    }

    /// Full verification of one delivery at an explicit clock reading:
    /// header parse, staleness, signature, then body extraction. Only a
    /// delivery that passes every step yields an event.
    pub fn verify_at(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        secret: &Secret,
        now_unix: i64,
    ) -> WebhookResult<WebhookEvent> {
        let header = SignatureHeader::parse(signature_header)?;
        self.check_timestamp(&header, now_unix)?;
        self.verify_signature(raw_body, &header, secret)?;
        WebhookEvent::from_body(raw_body)
    }

    /// Full verification against the wall clock.
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        secret: &Secret,
    ) -> WebhookResult<WebhookEvent> {
        self.verify_at(raw_body, signature_header, secret, Utc::now().timestamp())
    }
}

impl Default for WebhookVerifier {
    fn default() -> Self {
        Self::new()
    }
}
