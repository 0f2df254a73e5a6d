//! The connection aggregate.

use crate::ids::{ConnectionId, InstitutionId, UserId};
use crate::ledger::NonceLedger;
use crate::secret::Secret;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Discriminant of the last sync failure, persisted on the connection and
/// carried on telemetry events. One variant per failure kind in the sync
/// error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// The connection no longer exists locally.
    ConnectionNotFound,
    /// An account record arrived without an external identifier.
    MissingAccountIdentifier,
    /// An account record carried a currency outside the allow-list.
    InvalidAccountCurrency,
    /// A transaction record arrived without an external identifier.
    MissingTransactionIdentifier,
    /// A transaction amount failed to parse.
    InvalidTransactionAmount,
    /// A transaction record carried a currency outside the allow-list.
    InvalidTransactionCurrency,
    /// The aggregator answered HTTP 429.
    RateLimited,
    /// The aggregator failed (transport, HTTP error, unexpected payload).
    Provider,
    /// The local store failed.
    Store,
}

impl SyncErrorKind {
    /// Stable tag for logging and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionNotFound => "connection_not_found",
            Self::MissingAccountIdentifier => "missing_account_identifier",
            Self::InvalidAccountCurrency => "invalid_account_currency",
            Self::MissingTransactionIdentifier => "missing_transaction_identifier",
            Self::InvalidTransactionAmount => "invalid_transaction_amount",
            Self::InvalidTransactionCurrency => "invalid_transaction_currency",
            Self::RateLimited => "rate_limited",
            Self::Provider => "provider",
            Self::Store => "store",
        }
    }
}

/// Structured record of the last sync failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSyncError {
    /// Failure kind.
    pub kind: SyncErrorKind,
    /// Human-readable detail. Never contains credentials or payload bodies.
    pub message: String,
}

/// A user's authorized link to one institution via the aggregator.
///
/// Exactly one connection exists per (user, institution) pair; the store
/// enforces the invariant on insert. Cursor fields advance only through
/// [`crate::Store::commit_sync_success`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Local identifier.
    pub id: ConnectionId,
    /// Owning user.
    pub user_id: UserId,
    /// Institution this connection is enrolled with.
    pub institution_id: InstitutionId,
    /// Institution-side enrollment identifier.
    pub enrollment_id: String,
    /// Institution-side user identifier.
    pub provider_user_id: String,
    /// Opaque credential blob for the aggregator.
    pub access_token: Secret,
    /// Account-list pagination cursor from the last successful sync.
    pub accounts_cursor: Option<String>,
    /// Encoded per-account transaction cursors (see [`crate::CursorMap`]).
    pub transactions_cursor: Option<String>,
    /// Completion time of the last successful sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last sync failure, cleared by the next successful sync.
    pub last_sync_error: Option<LastSyncError>,
    /// When the last sync failure was recorded.
    pub last_sync_error_at: Option<DateTime<Utc>>,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: Secret,
    /// Hex SHA-256 of the webhook secret, safe to display.
    pub webhook_secret_hash: String,
    /// Replay-protection ledger for webhook deliveries.
    pub nonce_ledger: NonceLedger,
    /// Generic metadata map for embedding-application use.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Connection {
    /// Creates a connection fresh from a credential exchange.
    pub fn new(
        id: impl Into<ConnectionId>,
        user_id: impl Into<UserId>,
        institution_id: impl Into<InstitutionId>,
        access_token: Secret,
        webhook_secret: Secret,
    ) -> Self {
        let webhook_secret_hash = webhook_secret.sha256_hex();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            institution_id: institution_id.into(),
            enrollment_id: String::new(),
            provider_user_id: String::new(),
            access_token,
            accounts_cursor: None,
            transactions_cursor: None,
            last_synced_at: None,
            last_sync_error: None,
            last_sync_error_at: None,
            webhook_secret,
            webhook_secret_hash,
            nonce_ledger: NonceLedger::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the institution-side enrollment identifiers.
    pub fn with_enrollment(
        mut self,
        enrollment_id: impl Into<String>,
        provider_user_id: impl Into<String>,
    ) -> Self {
        self.enrollment_id = enrollment_id.into();
        self.provider_user_id = provider_user_id.into();
        self
    }

    /// Sets the persisted cursors, for restoring a connection from storage.
    pub fn with_cursors(
        mut self,
        accounts_cursor: Option<String>,
        transactions_cursor: Option<String>,
    ) -> Self {
        self.accounts_cursor = accounts_cursor;
        self.transactions_cursor = transactions_cursor;
        self
    }
}
