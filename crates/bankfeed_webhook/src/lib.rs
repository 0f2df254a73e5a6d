//! # bankfeed Webhook
//!
//! Authenticated, deduplicated ingestion of aggregator push notifications.
//!
//! This crate provides:
//! - Signature-header parsing (`t=<unix>,v1=<hex>[,v1=<hex>,...]`)
//! - HMAC-SHA256 verification over the exact raw body, with secret
//!   rotation (any `v1` value may match) and constant-time comparison
//! - A staleness window rejecting old timestamps before anything else
//! - Replay deduplication against the connection's nonce ledger
//! - A handler that enqueues the same sync pipeline a scheduled pull uses
//!
//! The handler produces a disposition, not an HTTP response: authenticated
//! deliveries - including duplicates and unknown connections - map to 200
//! so the aggregator stops redelivering; verification failures map to 400
//! and are terminal for that delivery.
//!
//! The raw request body must be captured before any JSON middleware
//! touches the stream; re-serialized JSON will not reproduce the signed
//! bytes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod handler;
mod signature;
mod verifier;

pub use error::{WebhookError, WebhookResult};
pub use event::WebhookEvent;
pub use handler::{Delivery, IgnoreReason, WebhookHandler, DEFAULT_LEDGER_RETENTION_SECONDS};
pub use signature::SignatureHeader;
pub use verifier::{WebhookVerifier, DEFAULT_TOLERANCE_SECONDS};
