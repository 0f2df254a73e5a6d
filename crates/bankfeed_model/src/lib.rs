//! # bankfeed Model
//!
//! Domain model and local store boundary for bankfeed.
//!
//! This crate provides:
//! - Identifier newtypes and fixed-point amounts
//! - The `Connection` aggregate (credentials, cursors, webhook secret, nonce ledger)
//! - Local `Account` and `Transaction` projections
//! - The per-account cursor codec with its legacy-cursor compatibility shim
//! - The `Store` trait and an in-memory reference implementation
//!
//! ## Key Invariants
//!
//! - Exactly one `Connection` per (user, institution) pair
//! - Cursors advance only through the atomic success commit
//! - Upserts are keyed by uniqueness constraints, making repeated application idempotent
//! - The nonce ledger is pruned by event time, never wall clock

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod amount;
mod connection;
mod currency;
mod cursor;
mod ids;
mod ledger;
mod secret;
mod store;
mod transaction;

pub use account::{Account, AccountBalances};
pub use amount::{Amount, ParseAmountError};
pub use connection::{Connection, LastSyncError, SyncErrorKind};
pub use currency::is_supported_currency;
pub use cursor::{CursorMap, LEGACY_CURSOR_KEY};
pub use ids::{ConnectionId, InstitutionId, UserId};
pub use ledger::{LastEvent, NonceLedger};
pub use secret::Secret;
pub use store::{MemoryStore, Store, StoreError, StoreResult, SyncCommit};
pub use transaction::Transaction;
