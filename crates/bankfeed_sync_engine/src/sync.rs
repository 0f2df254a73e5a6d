//! The synchronizer: one full sync cycle for one connection.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::stats::SyncStats;
use bankfeed_model::{
    is_supported_currency, Account, AccountBalances, Amount, Connection, ConnectionId, CursorMap,
    Store, SyncCommit, Transaction,
};
use bankfeed_provider::{
    AccountRecord, ListQuery, Page, ProviderClient, ProviderError, TransactionRecord,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How much of the connection's history a cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Refetch from the beginning, ignoring persisted cursors.
    Full,
    /// Resume from the cursors persisted by the last successful cycle.
    Incremental,
}

impl SyncMode {
    /// Stable tag for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

/// Result of a successful sync cycle. Ephemeral; the durable effects are
/// the upserted rows and the committed connection state.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Accounts upserted.
    pub accounts_synced: u64,
    /// Transactions upserted.
    pub transactions_synced: u64,
    /// Account-list cursor that was committed.
    pub accounts_cursor: Option<String>,
    /// Encoded transaction-cursor table that was committed.
    pub transactions_cursor: Option<String>,
    /// The connection as committed.
    pub connection: Connection,
}

/// Orchestrates one sync cycle: fetch, reconcile, persist.
///
/// Pagination is strictly sequential and accounts fully reconcile before
/// any transaction fetch, keeping cursor advancement deterministic. All
/// persistence goes through the [`Store`] seam and all network traffic
/// through the [`ProviderClient`] seam, so cycles are fully scriptable in
/// tests.
pub struct Synchronizer<P, S> {
    config: SyncConfig,
    provider: Arc<P>,
    store: Arc<S>,
    stats: RwLock<SyncStats>,
}

impl<P: ProviderClient, S: Store> Synchronizer<P, S> {
    /// Creates a new synchronizer.
    pub fn new(config: SyncConfig, provider: Arc<P>, store: Arc<S>) -> Self {
        Self {
            config,
            provider,
            store,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns accumulated statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one sync cycle for `connection_id`.
    ///
    /// On success the new cursors, `last_synced_at`, and a cleared error
    /// are committed atomically. On failure only the error fields are
    /// written; cursors stay exactly as they were, so the next cycle
    /// resumes from the last fully committed batch.
    pub async fn sync(
        &self,
        connection_id: &ConnectionId,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome> {
        match self.run(connection_id, mode).await {
            Ok(outcome) => {
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.accounts_synced += outcome.accounts_synced;
                    stats.transactions_synced += outcome.transactions_synced;
                    stats.last_error = None;
                }
                tracing::info!(
                    user = %outcome.connection.user_id,
                    connection = %connection_id,
                    institution = %outcome.connection.institution_id,
                    accounts = outcome.accounts_synced,
                    transactions = outcome.transactions_synced,
                    "sync succeeded"
                );
                Ok(outcome)
            }
            Err(error) => {
                let kind = error.kind();
                {
                    let mut stats = self.stats.write();
                    stats.cycles_failed += 1;
                    if matches!(error, SyncError::RateLimited { .. }) {
                        stats.rate_limit_hits += 1;
                    }
                    stats.last_error = Some(kind);
                }
                tracing::warn!(
                    connection = %connection_id,
                    error_kind = kind.as_str(),
                    "sync failed"
                );
                if !matches!(error, SyncError::ConnectionNotFound { .. }) {
                    if let Err(store_error) = self.store.record_sync_failure(
                        connection_id,
                        error.to_last_sync_error(),
                        Utc::now(),
                    ) {
                        tracing::error!(
                            connection = %connection_id,
                            error = %store_error,
                            "failed to record sync failure"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    async fn run(&self, connection_id: &ConnectionId, mode: SyncMode) -> SyncResult<SyncOutcome> {
        let connection = self
            .store
            .connection(connection_id)?
            .ok_or_else(|| SyncError::ConnectionNotFound {
                connection_id: connection_id.clone(),
            })?;

        tracing::info!(
            user = %connection.user_id,
            connection = %connection.id,
            institution = %connection.institution_id,
            mode = mode.as_str(),
            "sync started"
        );

        // Account pagination.
        let start_cursor = match mode {
            SyncMode::Incremental => connection.accounts_cursor.clone(),
            SyncMode::Full => None,
        };
        let (account_records, accounts_cursor) = self.fetch_accounts(start_cursor).await?;

        // Validate the whole batch before the first upsert; a malformed
        // record aborts the cycle with nothing committed.
        let mut accounts = Vec::with_capacity(account_records.len());
        for record in &account_records {
            accounts.push(convert_account(&connection, record)?);
        }
        for account in &accounts {
            self.store.upsert_account(account)?;
        }

        // Per-account transaction pagination, in the order accounts were
        // served. The decoded table supplies each account's resume point,
        // falling back to the legacy single cursor until the first
        // successful cycle rewrites the blob per-account.
        let cursor_table = CursorMap::decode(connection.transactions_cursor.as_deref());
        let mut next_cursors: BTreeMap<String, Option<String>> = BTreeMap::new();
        let mut transactions_synced = 0u64;
        for account in &accounts {
            let start = match mode {
                SyncMode::Incremental => {
                    cursor_table.get(&account.external_id).map(str::to_owned)
                }
                SyncMode::Full => None,
            };
            let (records, latest) = self
                .fetch_transactions(&account.external_id, start)
                .await?;

            let mut transactions = Vec::with_capacity(records.len());
            for record in &records {
                transactions.push(convert_transaction(account, record)?);
            }
            for transaction in &transactions {
                self.store
                    .upsert_transaction(&connection.user_id, transaction)?;
            }
            transactions_synced += transactions.len() as u64;
            let _ = next_cursors.insert(account.external_id.clone(), latest);
        }

        let transactions_cursor = CursorMap::encode_entries(&next_cursors);
        let committed = self.store.commit_sync_success(
            connection_id,
            SyncCommit {
                accounts_cursor: accounts_cursor.clone(),
                transactions_cursor: transactions_cursor.clone(),
                synced_at: Utc::now(),
            },
        )?;

        Ok(SyncOutcome {
            accounts_synced: accounts.len() as u64,
            transactions_synced,
            accounts_cursor,
            transactions_cursor,
            connection: committed,
        })
    }

    /// Walks the account listing to the end. Returns all records plus the
    /// last cursor the provider returned - which is what gets persisted,
    /// even when that is `None` on the very first page.
    async fn fetch_accounts(
        &self,
        start_cursor: Option<String>,
    ) -> SyncResult<(Vec<AccountRecord>, Option<String>)> {
        let mut cursor = start_cursor;
        let mut latest = None;
        let mut records = Vec::new();
        loop {
            let query = ListQuery {
                cursor: cursor.clone(),
                count: Some(self.config.page_size),
            };
            let page: Page<AccountRecord> = self
                .provider
                .list_accounts(&query)
                .await
                .map_err(SyncError::from_provider)?;
            records.extend(page.items);
            match page.next_cursor {
                Some(next) => {
                    latest = Some(next.clone());
                    cursor = Some(next);
                }
                None => break,
            }
        }
        Ok((records, latest))
    }

    /// Walks one account's transaction listing to the end; same cursor
    /// contract as [`Self::fetch_accounts`].
    async fn fetch_transactions(
        &self,
        account_external_id: &str,
        start_cursor: Option<String>,
    ) -> SyncResult<(Vec<TransactionRecord>, Option<String>)> {
        let mut cursor = start_cursor;
        let mut latest = None;
        let mut records = Vec::new();
        loop {
            let query = ListQuery {
                cursor: cursor.clone(),
                count: Some(self.config.page_size),
            };
            let page: Page<TransactionRecord> = self
                .provider
                .list_transactions(account_external_id, &query)
                .await
                .map_err(SyncError::from_provider)?;
            records.extend(page.items);
            match page.next_cursor {
                Some(next) => {
                    latest = Some(next.clone());
                    cursor = Some(next);
                }
                None => break,
            }
        }
        Ok((records, latest))
    }
}

/// Validates one account record and projects it onto the local model.
fn convert_account(connection: &Connection, record: &AccountRecord) -> SyncResult<Account> {
    if record.id.is_empty() {
        return Err(SyncError::MissingAccountIdentifier);
    }
    if !is_supported_currency(&record.currency) {
        return Err(SyncError::InvalidAccountCurrency {
            account: record.id.clone(),
            currency: record.currency.clone(),
        });
    }

    let current = parse_balance(&record.id, &record.balances.current)?;
    let available = record
        .balances
        .available
        .as_deref()
        .map(|raw| parse_balance(&record.id, raw))
        .transpose()?;

    Ok(Account {
        user_id: connection.user_id.clone(),
        connection_id: connection.id.clone(),
        external_id: record.id.clone(),
        name: record.name.clone(),
        kind: record.kind.clone(),
        currency: record.currency.clone(),
        balances: AccountBalances { current, available },
    })
}

fn parse_balance(account: &str, raw: &str) -> SyncResult<Amount> {
    raw.parse().map_err(|_| {
        SyncError::Provider(ProviderError::unexpected(format!(
            "account {account}: malformed balance"
        )))
    })
}

/// Validates one transaction record and projects it onto the local model.
fn convert_transaction(account: &Account, record: &TransactionRecord) -> SyncResult<Transaction> {
    if record.id.is_empty() {
        return Err(SyncError::MissingTransactionIdentifier {
            account: account.external_id.clone(),
        });
    }
    let amount: Amount = record.amount.parse().map_err(|_| {
        SyncError::InvalidTransactionAmount {
            account: account.external_id.clone(),
            transaction: record.id.clone(),
        }
    })?;
    if !is_supported_currency(&record.currency) {
        return Err(SyncError::InvalidTransactionCurrency {
            account: account.external_id.clone(),
            transaction: record.id.clone(),
            currency: record.currency.clone(),
        });
    }

    Ok(Transaction {
        account_external_id: account.external_id.clone(),
        external_id: record.id.clone(),
        amount,
        currency: record.currency.clone(),
        description: record.description.clone(),
        posted_at: record.posted_at,
        pending: record.pending,
    })
}
