//! Local account projection.

use crate::amount::Amount;
use crate::ids::{ConnectionId, UserId};
use serde::{Deserialize, Serialize};

/// Balances carried on an account projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// Ledger balance.
    pub current: Amount,
    /// Available balance, when the institution reports one.
    pub available: Option<Amount>,
}

/// Local projection of an aggregator account.
///
/// Identified uniquely by (user, external id). Mutable fields are
/// overwritten wholesale on every successful sync; the row never diverges
/// from the latest upstream snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Owning user.
    pub user_id: UserId,
    /// Connection the account was fetched through.
    pub connection_id: ConnectionId,
    /// Aggregator-issued account identifier.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Account kind in the aggregator's vocabulary (e.g. `depository`).
    pub kind: String,
    /// ISO-4217 currency code.
    pub currency: String,
    /// Current balances.
    pub balances: AccountBalances,
}
