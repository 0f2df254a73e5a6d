//! Job shapes and the queue seam.

use bankfeed_model::ConnectionId;
use bankfeed_sync_engine::SyncMode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

/// A unit of work on the sync queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    /// Enumerate connections due for incremental sync and enqueue one
    /// targeted job per connection.
    Dispatch,
    /// Sync exactly one connection.
    SyncConnection {
        /// Connection to sync.
        connection_id: ConnectionId,
        /// Full or incremental.
        mode: SyncMode,
        /// Whitelisted identifiers logged alongside the job (for example
        /// the triggering webhook event name). Never credentials or
        /// payload bodies.
        #[serde(default)]
        telemetry: BTreeMap<String, String>,
    },
}

impl Job {
    /// Creates a dispatch job.
    pub fn dispatch() -> Self {
        Self::Dispatch
    }

    /// Creates a targeted sync job with empty telemetry.
    pub fn sync(connection_id: impl Into<ConnectionId>, mode: SyncMode) -> Self {
        Self::SyncConnection {
            connection_id: connection_id.into(),
            mode,
            telemetry: BTreeMap::new(),
        }
    }

    /// Attaches a telemetry field.
    pub fn with_telemetry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::SyncConnection { telemetry, .. } = &mut self {
            let _ = telemetry.insert(key.into(), value.into());
        }
        self
    }

    /// Uniqueness key preventing two live copies of the same work.
    ///
    /// Two sync jobs for one connection must not run concurrently; the key
    /// is derived from the connection's identity so a duplicate enqueue is
    /// a harmless no-op.
    pub fn unique_key(&self) -> String {
        match self {
            Self::Dispatch => "sync-dispatch".to_owned(),
            Self::SyncConnection { connection_id, .. } => {
                format!("sync-connection:{connection_id}")
            }
        }
    }
}

/// How the queue should treat a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work done; drop the job.
    Complete,
    /// Transient failure; retry under the queue's backoff policy.
    Retry {
        /// Error-kind tag plus display message for the queue's records.
        error: String,
    },
    /// Defer without counting as a failure.
    Snooze {
        /// How long to defer.
        seconds: u64,
    },
    /// Unworkable job; drop it without retrying.
    Discard {
        /// Why the job was dropped.
        reason: String,
    },
}

/// The durable queue seam.
///
/// Real deployments back this with their job system; the contract the
/// worker relies on is uniqueness-key suppression and delayed scheduling.
pub trait JobQueue: Send + Sync {
    /// Enqueues a job.
    ///
    /// Passing a `unique_key` suppresses the enqueue while another live
    /// job holds the same key; suppression is a harmless no-op reported as
    /// `false`. `delay` schedules the job for later.
    fn enqueue(&self, job: Job, unique_key: Option<String>, delay: Option<Duration>) -> bool;
}

/// One queued entry, as handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    /// The job payload.
    pub job: Job,
    /// 1-indexed attempt count.
    pub attempt: u32,
    /// Scheduling delay the entry was enqueued with.
    pub delay: Option<Duration>,
    unique_key: Option<String>,
}

/// An in-memory queue for tests and single-process embeddings.
///
/// FIFO with uniqueness keys held while an entry is queued and released
/// when it is popped. Delays are recorded, not slept on; a popping caller
/// decides whether delayed entries are ready.
#[derive(Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<QueuedJob>>,
    live_keys: Mutex<BTreeSet<String>>,
}

impl MemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of queued entries, in order.
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Pops the first entry with no scheduling delay, releasing its
    /// uniqueness key. Delayed entries are skipped.
    pub fn pop_immediate(&self) -> Option<QueuedJob> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|entry| entry.delay.is_none())?;
        let entry = entries.remove(position)?;
        if let Some(key) = &entry.unique_key {
            let _ = self.live_keys.lock().remove(key);
        }
        Some(entry)
    }

    /// Re-enqueues a popped entry for another attempt.
    pub fn requeue(&self, entry: QueuedJob, delay: Option<Duration>) {
        self.push(QueuedJob {
            attempt: entry.attempt + 1,
            delay,
            ..entry
        });
    }

    fn push(&self, entry: QueuedJob) {
        if let Some(key) = &entry.unique_key {
            let mut keys = self.live_keys.lock();
            if !keys.insert(key.clone()) {
                return;
            }
        }
        self.entries.lock().push_back(entry);
    }
}

impl JobQueue for MemoryQueue {
    fn enqueue(&self, job: Job, unique_key: Option<String>, delay: Option<Duration>) -> bool {
        if let Some(key) = &unique_key {
            if self.live_keys.lock().contains(key) {
                return false;
            }
        }
        self.push(QueuedJob {
            job,
            attempt: 1,
            delay,
            unique_key,
        });
        true
    }
}
