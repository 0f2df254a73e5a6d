//! The aggregator client seam.

use crate::error::{ProviderError, ProviderResult};
use crate::records::{AccountRecord, TransactionRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// Parameters for a paginated list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Opaque continuation cursor from a previous page, if any.
    pub cursor: Option<String>,
    /// Requested page size; the provider may serve fewer.
    pub count: Option<u32>,
}

impl ListQuery {
    /// Creates an empty query (first page, provider-default page size).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the continuation cursor.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Sets the requested page size.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Records on this page, in provider order.
    pub items: Vec<T>,
    /// Cursor for the next page; absent on the final page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Creates a final page with no continuation cursor.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// A client for the aggregator's paginated list operations.
///
/// Implementations own transport concerns (HTTP, auth refresh,
/// transport-level retries). The sync engine depends only on this trait.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Lists the connection's accounts, one page per call.
    async fn list_accounts(&self, query: &ListQuery) -> ProviderResult<Page<AccountRecord>>;

    /// Lists one account's transactions, one page per call.
    async fn list_transactions(
        &self,
        account_external_id: &str,
        query: &ListQuery,
    ) -> ProviderResult<Page<TransactionRecord>>;
}

/// A scriptable provider for tests.
///
/// Responses are queued per operation and served in order; an exhausted
/// queue yields an `unexpected` error so a test that over-fetches fails
/// loudly. Every call is recorded with the query it carried.
#[derive(Default)]
pub struct MockProvider {
    accounts: Mutex<VecDeque<ProviderResult<Page<AccountRecord>>>>,
    transactions: Mutex<BTreeMap<String, VecDeque<ProviderResult<Page<TransactionRecord>>>>>,
    account_calls: Mutex<Vec<ListQuery>>,
    transaction_calls: Mutex<Vec<(String, ListQuery)>>,
}

impl MockProvider {
    /// Creates a provider with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an account page.
    pub fn push_accounts_page(&self, page: Page<AccountRecord>) {
        self.accounts.lock().push_back(Ok(page));
    }

    /// Queues an account-listing error.
    pub fn push_accounts_error(&self, error: ProviderError) {
        self.accounts.lock().push_back(Err(error));
    }

    /// Queues a transaction page for one account.
    pub fn push_transactions_page(&self, account_external_id: &str, page: Page<TransactionRecord>) {
        self.transactions
            .lock()
            .entry(account_external_id.to_owned())
            .or_default()
            .push_back(Ok(page));
    }

    /// Queues a transaction-listing error for one account.
    pub fn push_transactions_error(&self, account_external_id: &str, error: ProviderError) {
        self.transactions
            .lock()
            .entry(account_external_id.to_owned())
            .or_default()
            .push_back(Err(error));
    }

    /// Queries recorded for `list_accounts`, in call order.
    pub fn account_calls(&self) -> Vec<ListQuery> {
        self.account_calls.lock().clone()
    }

    /// (account, query) pairs recorded for `list_transactions`, in call order.
    pub fn transaction_calls(&self) -> Vec<(String, ListQuery)> {
        self.transaction_calls.lock().clone()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn list_accounts(&self, query: &ListQuery) -> ProviderResult<Page<AccountRecord>> {
        self.account_calls.lock().push(query.clone());
        self.accounts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::unexpected("no scripted accounts response")))
    }

    async fn list_transactions(
        &self,
        account_external_id: &str,
        query: &ListQuery,
    ) -> ProviderResult<Page<TransactionRecord>> {
        self.transaction_calls
            .lock()
            .push((account_external_id.to_owned(), query.clone()));
        self.transactions
            .lock()
            .get_mut(account_external_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ProviderError::unexpected(format!(
                    "no scripted transactions response for {account_external_id}"
                )))
            })
    }
}
