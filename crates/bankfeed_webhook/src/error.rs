//! Error types for webhook handling.

use bankfeed_model::StoreError;
use thiserror::Error;

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Errors that reject a single webhook delivery.
///
/// None of these are ever retried locally: the aggregator redelivers on
/// its own schedule and each delivery is judged alone. Everything except a
/// store failure maps to HTTP 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header was malformed or no signature matched.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signed timestamp is outside the tolerance window, regardless of
    /// whether the signature would otherwise verify.
    #[error("stale timestamp: {age_seconds}s old")]
    StaleTimestamp {
        /// Absolute distance from now, in seconds.
        age_seconds: i64,
    },

    /// The body is not a JSON object.
    #[error("malformed body")]
    MalformedBody,

    /// The body carries no non-empty `nonce` field.
    #[error("missing nonce")]
    NonceMissing,

    /// The body carries no non-empty `event` field.
    #[error("missing event")]
    EventMissing,

    /// The body carries no non-empty `connection_id` field.
    #[error("missing connection_id")]
    ConnectionMissing,

    /// The local store failed while recording the delivery.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebhookError {
    /// Stable tag naming the rejection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::StaleTimestamp { .. } => "stale_timestamp",
            Self::MalformedBody => "malformed_body",
            Self::NonceMissing => "nonce_missing",
            Self::EventMissing => "event_missing",
            Self::ConnectionMissing => "connection_missing",
            Self::Store(_) => "store",
        }
    }

    /// HTTP status for the boundary: 400 for anything wrong with the
    /// delivery itself, 500 when we failed to record it.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Store(_) => 500,
            _ => 400,
        }
    }

    /// JSON body for the boundary response.
    pub fn response_body(&self) -> serde_json::Value {
        serde_json::json!({ "status": "error", "error": self.as_str() })
    }
}
