//! # bankfeed Worker
//!
//! Bridges a durable job queue to the synchronizer.
//!
//! This crate provides:
//! - The two job shapes: periodic dispatch fan-out and targeted sync
//! - The [`JobQueue`] seam with uniqueness keys and delayed scheduling
//! - An in-memory reference queue for tests and single-process embeddings
//! - Exponential backoff with a hard ceiling, and rate-limit snoozes
//!   clamped between the worker's own floor and that ceiling
//! - The [`Worker`] handler turning sync results into queue outcomes
//!
//! Queue-level retry backoff is deliberately distinct from anything the
//! synchronizer does in-cycle: the synchronizer never sleeps, it returns,
//! and the queue decides when the connection is tried again.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod config;
mod queue;
mod worker;

pub use backoff::BackoffPolicy;
pub use config::WorkerConfig;
pub use queue::{Job, JobOutcome, JobQueue, MemoryQueue, QueuedJob};
pub use worker::Worker;
