//! Error types for the sync engine.

use bankfeed_model::{ConnectionId, LastSyncError, StoreError, SyncErrorKind};
use bankfeed_provider::ProviderError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can abort a sync cycle. One variant per failure kind; a
/// failed cycle persists its kind and message on the connection and leaves
/// cursors untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The connection does not exist locally.
    #[error("connection {connection_id} not found")]
    ConnectionNotFound {
        /// The missing connection.
        connection_id: ConnectionId,
    },

    /// An account record arrived without an external identifier.
    #[error("account record missing external identifier")]
    MissingAccountIdentifier,

    /// An account record carried a currency outside the allow-list.
    #[error("account {account}: currency {currency} not supported")]
    InvalidAccountCurrency {
        /// Offending account external id.
        account: String,
        /// Offending currency code.
        currency: String,
    },

    /// A transaction record arrived without an external identifier.
    #[error("account {account}: transaction record missing external identifier")]
    MissingTransactionIdentifier {
        /// Account whose listing carried the record.
        account: String,
    },

    /// A transaction amount failed to parse.
    #[error("account {account}: transaction {transaction}: malformed amount")]
    InvalidTransactionAmount {
        /// Account whose listing carried the record.
        account: String,
        /// Offending transaction external id.
        transaction: String,
    },

    /// A transaction record carried a currency outside the allow-list.
    #[error("account {account}: transaction {transaction}: currency {currency} not supported")]
    InvalidTransactionCurrency {
        /// Account whose listing carried the record.
        account: String,
        /// Offending transaction external id.
        transaction: String,
        /// Offending currency code.
        currency: String,
    },

    /// The aggregator answered HTTP 429. Carries the provider's suggested
    /// delay when a numeric `Retry-After` header was present.
    #[error("rate limited by provider")]
    RateLimited {
        /// Suggested delay in seconds, if the provider sent one.
        retry_after: Option<u64>,
    },

    /// Any other aggregator failure.
    #[error(transparent)]
    Provider(ProviderError),

    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Converts a provider error, intercepting HTTP 429 into the dedicated
    /// rate-limit variant.
    pub fn from_provider(error: ProviderError) -> Self {
        if error.is_rate_limited() {
            Self::RateLimited {
                retry_after: error.retry_after(),
            }
        } else {
            Self::Provider(error)
        }
    }

    /// The persisted/telemetry discriminant for this error.
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::ConnectionNotFound { .. } => SyncErrorKind::ConnectionNotFound,
            Self::MissingAccountIdentifier => SyncErrorKind::MissingAccountIdentifier,
            Self::InvalidAccountCurrency { .. } => SyncErrorKind::InvalidAccountCurrency,
            Self::MissingTransactionIdentifier { .. } => SyncErrorKind::MissingTransactionIdentifier,
            Self::InvalidTransactionAmount { .. } => SyncErrorKind::InvalidTransactionAmount,
            Self::InvalidTransactionCurrency { .. } => SyncErrorKind::InvalidTransactionCurrency,
            Self::RateLimited { .. } => SyncErrorKind::RateLimited,
            Self::Provider(_) => SyncErrorKind::Provider,
            Self::Store(_) => SyncErrorKind::Store,
        }
    }

    /// The structured record persisted as the connection's last sync error.
    pub fn to_last_sync_error(&self) -> LastSyncError {
        LastSyncError {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// True if re-running the job may succeed. Validation failures stay
    /// retryable at the queue level (the provider may have corrected the
    /// record); a missing connection never is.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ConnectionNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_interception() {
        let err = SyncError::from_provider(ProviderError::http_with_headers(
            429,
            [("Retry-After".to_owned(), "30".to_owned())].into_iter().collect(),
            "rate limit exceeded",
        ));
        assert_eq!(err, SyncError::RateLimited { retry_after: Some(30) });

        let err = SyncError::from_provider(ProviderError::http(500, "boom"));
        assert!(matches!(err, SyncError::Provider(_)));
    }

    #[test]
    fn kinds_match_variants() {
        assert_eq!(
            SyncError::MissingAccountIdentifier.kind(),
            SyncErrorKind::MissingAccountIdentifier
        );
        assert_eq!(
            SyncError::RateLimited { retry_after: None }.kind(),
            SyncErrorKind::RateLimited
        );
    }

    #[test]
    fn retryability() {
        assert!(!SyncError::ConnectionNotFound { connection_id: "conn-1".into() }.is_retryable());
        assert!(SyncError::MissingAccountIdentifier.is_retryable());
        assert!(SyncError::Provider(ProviderError::transport("reset")).is_retryable());
    }

    #[test]
    fn last_sync_error_carries_kind_and_message() {
        let err = SyncError::InvalidAccountCurrency {
            account: "acct-1".into(),
            currency: "DOGE".into(),
        };
        let record = err.to_last_sync_error();
        assert_eq!(record.kind, SyncErrorKind::InvalidAccountCurrency);
        assert!(record.message.contains("DOGE"));
    }
}
