//! Aggregate statistics about sync cycles.

use bankfeed_model::SyncErrorKind;

/// Statistics accumulated across sync cycles run by one synchronizer.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync cycles that committed successfully.
    pub cycles_completed: u64,
    /// Sync cycles that aborted with an error.
    pub cycles_failed: u64,
    /// Total accounts upserted by successful cycles.
    pub accounts_synced: u64,
    /// Total transactions upserted by successful cycles.
    pub transactions_synced: u64,
    /// Cycles aborted by a provider rate limit.
    pub rate_limit_hits: u64,
    /// Kind of the most recent failure, cleared by the next success.
    pub last_error: Option<SyncErrorKind>,
}
