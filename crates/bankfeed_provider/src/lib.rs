//! # bankfeed Provider
//!
//! The consumed interface of the banking-data aggregator.
//!
//! This crate provides:
//! - The [`ProviderClient`] trait: paginated account and transaction listing
//! - Wire record types as the aggregator serves them
//! - A vendor-neutral error shape carrying HTTP status and response headers
//! - A scriptable [`MockProvider`] for tests
//!
//! The real transport wrapper (HTTP client, auth refresh, transport-level
//! retries, the fixed per-request timeout) lives with the embedding
//! application; the sync engine depends only on the trait in this crate,
//! which is what makes it substitutable in tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod records;

pub use client::{ListQuery, MockProvider, Page, ProviderClient};
pub use error::{ProviderError, ProviderResult, RETRY_AFTER_HEADER};
pub use records::{AccountRecord, BalanceRecord, InstitutionRecord, TransactionRecord};
