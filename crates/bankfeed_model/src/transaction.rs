//! Local transaction projection.

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local projection of an aggregator transaction.
///
/// Identified uniquely by (account, external id) and upserted. Amount and
/// currency are effectively immutable in practice, but a later upsert may
/// overwrite them when the provider corrects its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// External id of the owning account.
    pub account_external_id: String,
    /// Aggregator-issued transaction identifier.
    pub external_id: String,
    /// Signed amount; negative for outflows.
    pub amount: Amount,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Counterparty or memo text.
    pub description: String,
    /// Posting time reported by the institution.
    pub posted_at: DateTime<Utc>,
    /// True while the institution still reports the transaction as pending.
    pub pending: bool,
}
