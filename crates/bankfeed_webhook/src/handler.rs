//! The webhook ingestion handler.

use crate::error::WebhookResult;
use crate::event::WebhookEvent;
use crate::signature::SignatureHeader;
use crate::verifier::WebhookVerifier;
use bankfeed_model::{ConnectionId, Store};
use bankfeed_sync_engine::SyncMode;
use bankfeed_worker::{Job, JobQueue};
use chrono::Utc;
use std::sync::Arc;

/// Default nonce-ledger retention: one week of deliveries.
pub const DEFAULT_LEDGER_RETENTION_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Why an authenticated delivery was ignored rather than acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The nonce was already processed for this connection.
    Duplicate,
    /// No local connection matches the delivery's `connection_id`.
    UnknownConnection,
}

impl IgnoreReason {
    /// Stable tag for the response body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::UnknownConnection => "unknown_connection",
        }
    }
}

/// Disposition of one delivery that did not fail verification.
///
/// Both variants map to HTTP 200: answering a duplicate or an unknown
/// connection with an error would only feed the aggregator's redelivery
/// loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Verified, recorded, and a sync job enqueued.
    Accepted {
        /// Targeted connection.
        connection_id: ConnectionId,
        /// Event name from the body.
        event: String,
    },
    /// Verified (where possible) but deliberately not acted on.
    Ignored {
        /// Why.
        reason: IgnoreReason,
    },
}

impl Delivery {
    /// `"ok"` or `"ignored"`.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "ok",
            Self::Ignored { .. } => "ignored",
        }
    }

    /// Ignore reason, when there is one.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Accepted { .. } => None,
            Self::Ignored { reason } => Some(reason.as_str()),
        }
    }

    /// HTTP status for the boundary. Always 200.
    pub fn http_status(&self) -> u16 {
        200
    }

    /// JSON body for the boundary response.
    pub fn response_body(&self) -> serde_json::Value {
        match self.reason() {
            Some(reason) => serde_json::json!({ "status": self.status(), "reason": reason }),
            None => serde_json::json!({ "status": self.status() }),
        }
    }
}

/// Ingests verified deliveries: dedup against the nonce ledger, record,
/// and enqueue a targeted sync job on the same queue the scheduler uses.
pub struct WebhookHandler<S, Q> {
    verifier: WebhookVerifier,
    ledger_retention_seconds: i64,
    store: Arc<S>,
    queue: Arc<Q>,
}

impl<S: Store, Q: JobQueue> WebhookHandler<S, Q> {
    /// Creates a handler with the default ledger retention.
    pub fn new(verifier: WebhookVerifier, store: Arc<S>, queue: Arc<Q>) -> Self {
        Self {
            verifier,
            ledger_retention_seconds: DEFAULT_LEDGER_RETENTION_SECONDS,
            store,
            queue,
        }
    }

    /// Sets the nonce-ledger retention. Non-positive disables pruning.
    pub fn with_ledger_retention_seconds(mut self, retention_seconds: i64) -> Self {
        self.ledger_retention_seconds = retention_seconds;
        self
    }

    /// Handles one delivery against the wall clock.
    pub fn handle(&self, raw_body: &[u8], signature_header: &str) -> WebhookResult<Delivery> {
        self.handle_at(raw_body, signature_header, Utc::now().timestamp())
    }

    /// Handles one delivery at an explicit clock reading.
    ///
    /// Order matters: the header is parsed and the timestamp checked
    /// before the body is even looked at; the connection is resolved next
    /// because its secret is what the signature verifies against.
    pub fn handle_at(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        now_unix: i64,
    ) -> WebhookResult<Delivery> {
        let header = SignatureHeader::parse(signature_header)?;
        self.verifier.check_timestamp(&header, now_unix)?;

        let connection_id: ConnectionId =
            WebhookEvent::peek_connection_id(raw_body)?.into();
        let Some(mut connection) = self.store.connection(&connection_id)? else {
            tracing::info!(connection = %connection_id, "webhook for unknown connection ignored");
            return Ok(Delivery::Ignored {
                reason: IgnoreReason::UnknownConnection,
            });
        };

        self.verifier
            .verify_signature(raw_body, &header, &connection.webhook_secret)?;
        let event = WebhookEvent::from_body(raw_body)?;

        if connection.nonce_ledger.contains(&event.nonce) {
            tracing::info!(
                connection = %connection.id,
                event = %event.event,
                "replayed webhook delivery ignored"
            );
            return Ok(Delivery::Ignored {
                reason: IgnoreReason::Duplicate,
            });
        }

        connection.nonce_ledger.record(
            &event.nonce,
            header.timestamp,
            &event.event,
            self.ledger_retention_seconds,
        );
        self.store.update_connection(&connection)?;

        let job = Job::sync(connection.id.clone(), SyncMode::Incremental)
            .with_telemetry("source", "webhook")
            .with_telemetry("event", event.event.clone());
        let key = job.unique_key();
        let enqueued = self.queue.enqueue(job, Some(key), None);

        tracing::info!(
            user = %connection.user_id,
            connection = %connection.id,
            event = %event.event,
            enqueued,
            "webhook accepted"
        );
        Ok(Delivery::Accepted {
            connection_id: connection.id,
            event: event.event,
        })
    }
}
