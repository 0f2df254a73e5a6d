//! Webhook replay-protection ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of the most recent webhook delivery recorded on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastEvent {
    /// Event name as sent by the aggregator.
    pub event: String,
    /// Event timestamp (unix seconds, from the signature header).
    pub timestamp: i64,
}

/// A bounded replay cache of webhook nonces, owned by the connection.
///
/// Entries are pruned by event time rather than wall clock: a delivery at
/// event time `T` evicts every nonce recorded before `T - retention`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceLedger {
    entries: BTreeMap<String, i64>,
    last_event: Option<LastEvent>,
}

impl NonceLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `nonce` has already been processed.
    pub fn contains(&self, nonce: &str) -> bool {
        self.entries.contains_key(nonce)
    }

    /// Records a verified delivery.
    ///
    /// Prunes entries older than `retention_seconds` relative to
    /// `event_timestamp`, inserts the nonce, and updates the last-event
    /// summary. A non-positive retention disables pruning.
    pub fn record(&mut self, nonce: &str, event_timestamp: i64, event: &str, retention_seconds: i64) {
        if retention_seconds > 0 {
            let cutoff = event_timestamp.saturating_sub(retention_seconds);
            self.entries.retain(|_, recorded_at| *recorded_at >= cutoff);
        }
        let _ = self.entries.insert(nonce.to_owned(), event_timestamp);
        self.last_event = Some(LastEvent {
            event: event.to_owned(),
            timestamp: event_timestamp,
        });
    }

    /// Returns the most recent recorded delivery, if any.
    pub fn last_event(&self) -> Option<&LastEvent> {
        self.last_event.as_ref()
    }

    /// Number of live nonces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no nonces are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
