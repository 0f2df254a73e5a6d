//! Webhook event body extraction.

use crate::error::{WebhookError, WebhookResult};

/// The fields every aggregator push notification must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Single-use delivery identifier, used to detect redelivery.
    pub nonce: String,
    /// Event name (e.g. `transactions.updated`).
    pub event: String,
    /// Connection the event targets.
    pub connection_id: String,
}

impl WebhookEvent {
    /// Parses the body as a JSON object and extracts the required
    /// non-empty string fields. Each missing field yields its own error.
    pub fn from_body(raw_body: &[u8]) -> WebhookResult<Self> {
        let object = parse_object(raw_body)?;
        Ok(Self {
            nonce: required_field(&object, "nonce", WebhookError::NonceMissing)?,
            event: required_field(&object, "event", WebhookError::EventMissing)?,
            connection_id: required_field(&object, "connection_id", WebhookError::ConnectionMissing)?,
        })
    }

    /// Extracts only `connection_id`, for resolving the signing secret
    /// before full verification runs.
    pub fn peek_connection_id(raw_body: &[u8]) -> WebhookResult<String> {
        let object = parse_object(raw_body)?;
        required_field(&object, "connection_id", WebhookError::ConnectionMissing)
    }
}

fn parse_object(raw_body: &[u8]) -> WebhookResult<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_slice(raw_body) {
        Ok(serde_json::Value::Object(object)) => Ok(object),
        _ => Err(WebhookError::MalformedBody),
    }
}

fn required_field(
    object: &serde_json::Map<String, serde_json::Value>,
    name: &str,
    missing: WebhookError,
) -> WebhookResult<String> {
    match object.get(name).and_then(serde_json::Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(missing),
    }
}
