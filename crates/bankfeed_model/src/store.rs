//! Local store boundary.
//!
//! The sync pipeline only ever touches persistence through the [`Store`]
//! trait, so the engine, webhook handler, and worker can be exercised
//! against [`MemoryStore`] without a database.

use crate::account::Account;
use crate::connection::{Connection, LastSyncError};
use crate::ids::{ConnectionId, InstitutionId, UserId};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the local store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No connection with the given id.
    #[error("connection {connection_id} not found")]
    ConnectionNotFound {
        /// The missing connection.
        connection_id: ConnectionId,
    },

    /// A connection for this (user, institution) pair already exists.
    #[error("user {user_id} already has a connection to institution {institution_id}")]
    DuplicateConnection {
        /// Owning user.
        user_id: UserId,
        /// Institution of the existing connection.
        institution_id: InstitutionId,
    },

    /// A record failed field-level validation at the persistence boundary.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

/// The cursor-and-timestamp triple written atomically when a sync batch
/// completes. The three fields change together or not at all; cursors have
/// no other write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommit {
    /// Account-list cursor to persist.
    pub accounts_cursor: Option<String>,
    /// Encoded per-account transaction cursors to persist.
    pub transactions_cursor: Option<String>,
    /// Sync completion time.
    pub synced_at: DateTime<Utc>,
}

/// Persistence boundary for connections and their projections.
pub trait Store: Send + Sync {
    /// Fetches a connection by id.
    fn connection(&self, id: &ConnectionId) -> StoreResult<Option<Connection>>;

    /// Inserts a new connection, enforcing one per (user, institution).
    fn insert_connection(&self, connection: Connection) -> StoreResult<()>;

    /// Replaces a connection's persisted state (webhook ledger updates and
    /// other non-sync mutations).
    fn update_connection(&self, connection: &Connection) -> StoreResult<()>;

    /// Lists connections that have never synced or last synced before the
    /// given threshold.
    fn connections_due(&self, synced_before: DateTime<Utc>) -> StoreResult<Vec<ConnectionId>>;

    /// Atomically records a fully successful sync: both cursors,
    /// `last_synced_at`, and a cleared error, in one write.
    fn commit_sync_success(
        &self,
        id: &ConnectionId,
        commit: SyncCommit,
    ) -> StoreResult<Connection>;

    /// Records a failed sync. Cursors are untouched by design.
    fn record_sync_failure(
        &self,
        id: &ConnectionId,
        error: LastSyncError,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Inserts or updates an account keyed by (user, external id).
    fn upsert_account(&self, account: &Account) -> StoreResult<()>;

    /// Inserts or updates a transaction keyed by (account, external id).
    fn upsert_transaction(&self, user_id: &UserId, transaction: &Transaction) -> StoreResult<()>;

    /// Fetches an account projection.
    fn account(&self, user_id: &UserId, external_id: &str) -> StoreResult<Option<Account>>;

    /// Lists a user's account projections.
    fn accounts_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Account>>;

    /// Fetches a transaction projection.
    fn transaction(
        &self,
        user_id: &UserId,
        account_external_id: &str,
        external_id: &str,
    ) -> StoreResult<Option<Transaction>>;

    /// Lists one account's transaction projections.
    fn transactions_for_account(
        &self,
        user_id: &UserId,
        account_external_id: &str,
    ) -> StoreResult<Vec<Transaction>>;
}

#[derive(Default)]
struct Inner {
    connections: BTreeMap<ConnectionId, Connection>,
    accounts: BTreeMap<(UserId, String), Account>,
    transactions: BTreeMap<(UserId, String, String), Transaction>,
}

/// An in-memory store for tests and embedding without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of account projections, across all users.
    pub fn account_count(&self) -> usize {
        self.inner.read().accounts.len()
    }

    /// Total number of transaction projections, across all users.
    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }
}

impl Store for MemoryStore {
    fn connection(&self, id: &ConnectionId) -> StoreResult<Option<Connection>> {
        Ok(self.inner.read().connections.get(id).cloned())
    }

    fn insert_connection(&self, connection: Connection) -> StoreResult<()> {
        if connection.id.as_str().is_empty() {
            return Err(StoreError::Validation {
                field: "id",
                message: "must not be empty".into(),
            });
        }

        let mut inner = self.inner.write();
        let duplicate = inner.connections.values().any(|existing| {
            existing.user_id == connection.user_id
                && existing.institution_id == connection.institution_id
        });
        if duplicate {
            return Err(StoreError::DuplicateConnection {
                user_id: connection.user_id,
                institution_id: connection.institution_id,
            });
        }

        let _ = inner.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    fn update_connection(&self, connection: &Connection) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.connections.contains_key(&connection.id) {
            return Err(StoreError::ConnectionNotFound {
                connection_id: connection.id.clone(),
            });
        }
        let _ = inner
            .connections
            .insert(connection.id.clone(), connection.clone());
        Ok(())
    }

    fn connections_due(&self, synced_before: DateTime<Utc>) -> StoreResult<Vec<ConnectionId>> {
        Ok(self
            .inner
            .read()
            .connections
            .values()
            .filter(|conn| match conn.last_synced_at {
                None => true,
                Some(at) => at < synced_before,
            })
            .map(|conn| conn.id.clone())
            .collect())
    }

    fn commit_sync_success(
        &self,
        id: &ConnectionId,
        commit: SyncCommit,
    ) -> StoreResult<Connection> {
        let mut inner = self.inner.write();
        let connection =
            inner
                .connections
                .get_mut(id)
                .ok_or_else(|| StoreError::ConnectionNotFound {
                    connection_id: id.clone(),
                })?;

        connection.accounts_cursor = commit.accounts_cursor;
        connection.transactions_cursor = commit.transactions_cursor;
        connection.last_synced_at = Some(commit.synced_at);
        connection.last_sync_error = None;
        connection.last_sync_error_at = None;
        Ok(connection.clone())
    }

    fn record_sync_failure(
        &self,
        id: &ConnectionId,
        error: LastSyncError,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let connection =
            inner
                .connections
                .get_mut(id)
                .ok_or_else(|| StoreError::ConnectionNotFound {
                    connection_id: id.clone(),
                })?;

        connection.last_sync_error = Some(error);
        connection.last_sync_error_at = Some(at);
        Ok(())
    }

    fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        if account.external_id.is_empty() {
            return Err(StoreError::Validation {
                field: "external_id",
                message: "must not be empty".into(),
            });
        }
        let key = (account.user_id.clone(), account.external_id.clone());
        let _ = self.inner.write().accounts.insert(key, account.clone());
        Ok(())
    }

    fn upsert_transaction(&self, user_id: &UserId, transaction: &Transaction) -> StoreResult<()> {
        if transaction.external_id.is_empty() {
            return Err(StoreError::Validation {
                field: "external_id",
                message: "must not be empty".into(),
            });
        }
        let key = (
            user_id.clone(),
            transaction.account_external_id.clone(),
            transaction.external_id.clone(),
        );
        let _ = self.inner.write().transactions.insert(key, transaction.clone());
        Ok(())
    }

    fn account(&self, user_id: &UserId, external_id: &str) -> StoreResult<Option<Account>> {
        let key = (user_id.clone(), external_id.to_owned());
        Ok(self.inner.read().accounts.get(&key).cloned())
    }

    fn accounts_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Account>> {
        Ok(self
            .inner
            .read()
            .accounts
            .values()
            .filter(|account| &account.user_id == user_id)
            .cloned()
            .collect())
    }

    fn transaction(
        &self,
        user_id: &UserId,
        account_external_id: &str,
        external_id: &str,
    ) -> StoreResult<Option<Transaction>> {
        let key = (
            user_id.clone(),
            account_external_id.to_owned(),
            external_id.to_owned(),
        );
        Ok(self.inner.read().transactions.get(&key).cloned())
    }

    fn transactions_for_account(
        &self,
        user_id: &UserId,
        account_external_id: &str,
    ) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .inner
            .read()
            .transactions
            .iter()
            .filter(|((user, account, _), _)| {
                user == user_id && account == account_external_id
            })
            .map(|(_, txn)| txn.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::account::AccountBalances;
    use crate::connection::SyncErrorKind;
    use crate::secret::Secret;
    use chrono::TimeZone;

    fn connection(id: &str, user: &str, institution: &str) -> Connection {
        Connection::new(
            id,
            user,
            institution,
            Secret::new("tok"),
            Secret::new("whsec"),
        )
    }

    fn account(user: &str, external_id: &str) -> Account {
        Account {
            user_id: user.into(),
            connection_id: "conn-1".into(),
            external_id: external_id.to_owned(),
            name: "Checking".into(),
            kind: "depository".into(),
            currency: "USD".into(),
            balances: AccountBalances {
                current: "42.00".parse::<Amount>().unwrap(),
                available: None,
            },
        }
    }

    fn when(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn one_connection_per_user_institution() {
        let store = MemoryStore::new();
        store
            .insert_connection(connection("conn-1", "user-1", "inst-1"))
            .unwrap();

        let err = store
            .insert_connection(connection("conn-2", "user-1", "inst-1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateConnection { .. }));

        // Same institution, different user is fine.
        store
            .insert_connection(connection("conn-3", "user-2", "inst-1"))
            .unwrap();
    }

    #[test]
    fn upserts_are_idempotent() {
        let store = MemoryStore::new();
        let acct = account("user-1", "acct-1");
        store.upsert_account(&acct).unwrap();
        store.upsert_account(&acct).unwrap();
        assert_eq!(store.account_count(), 1);

        let mut renamed = acct.clone();
        renamed.name = "Everyday Checking".into();
        store.upsert_account(&renamed).unwrap();
        assert_eq!(store.account_count(), 1);
        let stored = store.account(&"user-1".into(), "acct-1").unwrap().unwrap();
        assert_eq!(stored.name, "Everyday Checking");
    }

    #[test]
    fn empty_external_id_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = store.upsert_account(&account("user-1", "")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation { field: "external_id", .. }
        ));
    }

    #[test]
    fn success_commit_sets_cursors_and_clears_error() {
        let store = MemoryStore::new();
        store
            .insert_connection(connection("conn-1", "user-1", "inst-1"))
            .unwrap();
        store
            .record_sync_failure(
                &"conn-1".into(),
                LastSyncError {
                    kind: SyncErrorKind::Provider,
                    message: "transport error".into(),
                },
                when(1_000),
            )
            .unwrap();

        let updated = store
            .commit_sync_success(
                &"conn-1".into(),
                SyncCommit {
                    accounts_cursor: Some("cur-a".into()),
                    transactions_cursor: Some(r#"{"acct-1":"cur-t"}"#.into()),
                    synced_at: when(2_000),
                },
            )
            .unwrap();

        assert_eq!(updated.accounts_cursor.as_deref(), Some("cur-a"));
        assert_eq!(updated.last_synced_at, Some(when(2_000)));
        assert!(updated.last_sync_error.is_none());
        assert!(updated.last_sync_error_at.is_none());
    }

    #[test]
    fn failure_record_leaves_cursors_untouched() {
        let store = MemoryStore::new();
        store
            .insert_connection(
                connection("conn-1", "user-1", "inst-1")
                    .with_cursors(Some("cur-a".into()), Some(r#"{"acct-1":"t"}"#.into())),
            )
            .unwrap();

        store
            .record_sync_failure(
                &"conn-1".into(),
                LastSyncError {
                    kind: SyncErrorKind::InvalidAccountCurrency,
                    message: "currency DOGE not supported".into(),
                },
                when(3_000),
            )
            .unwrap();

        let conn = store.connection(&"conn-1".into()).unwrap().unwrap();
        assert_eq!(conn.accounts_cursor.as_deref(), Some("cur-a"));
        assert_eq!(conn.transactions_cursor.as_deref(), Some(r#"{"acct-1":"t"}"#));
        assert_eq!(
            conn.last_sync_error.unwrap().kind,
            SyncErrorKind::InvalidAccountCurrency
        );
    }

    #[test]
    fn due_listing_includes_never_synced() {
        let store = MemoryStore::new();
        store
            .insert_connection(connection("conn-1", "user-1", "inst-1"))
            .unwrap();
        store
            .insert_connection(connection("conn-2", "user-2", "inst-1"))
            .unwrap();
        let _ = store
            .commit_sync_success(
                &"conn-2".into(),
                SyncCommit {
                    accounts_cursor: None,
                    transactions_cursor: None,
                    synced_at: when(5_000),
                },
            )
            .unwrap();

        // conn-1 never synced; conn-2 synced after the threshold.
        let due = store.connections_due(when(4_000)).unwrap();
        assert_eq!(due, vec![ConnectionId::new("conn-1")]);

        let due = store.connections_due(when(6_000)).unwrap();
        assert_eq!(due.len(), 2);
    }
}
