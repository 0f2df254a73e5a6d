//! # bankfeed Sync Engine
//!
//! One full sync cycle for one connection: fetch, reconcile, persist.
//!
//! This crate provides:
//! - The [`Synchronizer`]: pagination-aware fetch loops over the aggregator
//! - Fail-fast validation of provider records against a typed taxonomy
//! - Idempotent upsert reconciliation of accounts and transactions
//! - Per-account cursor tracking with an atomic commit
//! - Rate-limit interception (HTTP 429 is never a hard failure)
//!
//! ## Key Invariants
//!
//! - Account reconciliation fully completes before any transaction fetch
//! - Cursors advance only after a fully successful batch; a failed batch
//!   leaves them exactly as they were
//! - Upserts are idempotent, so retried or reordered batches are safe
//! - Telemetry carries whitelisted identifiers and error kinds only

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod stats;
mod sync;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use stats::SyncStats;
pub use sync::{SyncMode, SyncOutcome, Synchronizer};
