//! Wire record types, as served by the aggregator.
//!
//! Amounts stay as strings here; the sync engine owns validation and
//! conversion. Deserializing a page never fails on a bad record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Institution descriptor nested in an account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    /// Aggregator-issued institution id.
    pub id: String,
    /// Institution display name.
    pub name: String,
}

/// Balances nested in an account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Ledger balance, decimal string.
    pub current: String,
    /// Available balance, decimal string, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
}

/// One account as listed by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Aggregator-issued account id. Empty or missing ids abort the sync.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Account kind in the aggregator's vocabulary.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// ISO-4217 currency code.
    #[serde(default)]
    pub currency: String,
    /// Balances.
    pub balances: BalanceRecord,
    /// Institution the account belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<InstitutionRecord>,
}

/// One transaction as listed by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Aggregator-issued transaction id. Empty or missing ids abort the sync.
    #[serde(default)]
    pub id: String,
    /// Signed amount, decimal string; negative for outflows.
    #[serde(default)]
    pub amount: String,
    /// ISO-4217 currency code.
    #[serde(default)]
    pub currency: String,
    /// Counterparty or memo text.
    #[serde(default)]
    pub description: String,
    /// Posting time.
    pub posted_at: DateTime<Utc>,
    /// True while the institution still reports the transaction as pending.
    #[serde(default)]
    pub pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_record_from_wire_json() {
        let record: AccountRecord = serde_json::from_str(
            r#"{
                "id": "acct-1",
                "name": "Checking",
                "type": "depository",
                "currency": "USD",
                "balances": {"current": "42.00"},
                "institution": {"id": "inst-1", "name": "First Bank"}
            }"#,
        )
        .unwrap();
        assert_eq!(record.id, "acct-1");
        assert_eq!(record.kind, "depository");
        assert_eq!(record.balances.current, "42.00");
        assert!(record.balances.available.is_none());
    }

    #[test]
    fn missing_id_deserializes_to_empty() {
        // The engine turns this into a typed validation error; the wire
        // layer must not reject the page.
        let record: AccountRecord = serde_json::from_str(
            r#"{"currency": "USD", "balances": {"current": "0"}}"#,
        )
        .unwrap();
        assert!(record.id.is_empty());
    }

    #[test]
    fn transaction_record_from_wire_json() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{
                "id": "txn-1",
                "amount": "-1.00",
                "currency": "USD",
                "description": "COFFEE SHOP",
                "posted_at": "2024-02-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(record.amount, "-1.00");
        assert!(!record.pending);
        assert_eq!(record.posted_at.timestamp(), 1_706_745_600);
    }
}
