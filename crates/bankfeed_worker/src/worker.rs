//! The worker: queue handler and dispatch fan-out.

use crate::config::WorkerConfig;
use crate::queue::{Job, JobOutcome, JobQueue, MemoryQueue};
use bankfeed_model::Store;
use bankfeed_provider::ProviderClient;
use bankfeed_sync_engine::{SyncError, SyncMode, Synchronizer};
use chrono::Utc;
use std::sync::Arc;

/// Consumes sync jobs and turns synchronizer results into queue outcomes.
///
/// One job runs to completion on one worker; there is no intra-sync
/// parallelism. Across connections, jobs are independent and the queue may
/// run them fully concurrently - the connection-derived uniqueness key is
/// what keeps two jobs for one connection from coexisting.
pub struct Worker<P, S, Q> {
    config: WorkerConfig,
    synchronizer: Arc<Synchronizer<P, S>>,
    store: Arc<S>,
    queue: Arc<Q>,
}

impl<P: ProviderClient, S: Store, Q: JobQueue> Worker<P, S, Q> {
    /// Creates a worker.
    pub fn new(
        config: WorkerConfig,
        synchronizer: Arc<Synchronizer<P, S>>,
        store: Arc<S>,
        queue: Arc<Q>,
    ) -> Self {
        Self {
            config,
            synchronizer,
            store,
            queue,
        }
    }

    /// Handles one job on its given attempt.
    pub async fn handle(&self, job: &Job, attempt: u32) -> JobOutcome {
        match job {
            Job::Dispatch => self.handle_dispatch(),
            Job::SyncConnection {
                connection_id,
                mode,
                telemetry,
            } => {
                let source = telemetry.get("source").map(String::as_str).unwrap_or("");
                tracing::debug!(
                    connection = %connection_id,
                    mode = mode.as_str(),
                    attempt,
                    source,
                    "handling sync job"
                );
                self.handle_sync(connection_id, *mode, attempt).await
            }
        }
    }

    fn handle_dispatch(&self) -> JobOutcome {
        let threshold = Utc::now()
            - chrono::Duration::from_std(self.config.sync_interval)
                .unwrap_or_else(|_| chrono::Duration::hours(6));
        let due = match self.store.connections_due(threshold) {
            Ok(due) => due,
            Err(error) => {
                return JobOutcome::Retry {
                    error: format!("store: {error}"),
                }
            }
        };

        let mut enqueued = 0usize;
        for connection_id in &due {
            let job = Job::sync(connection_id.clone(), SyncMode::Incremental)
                .with_telemetry("source", "dispatch");
            let key = job.unique_key();
            if self.queue.enqueue(job, Some(key), None) {
                enqueued += 1;
            }
        }
        tracing::info!(due = due.len(), enqueued, "dispatch fan-out");
        JobOutcome::Complete
    }

    async fn handle_sync(
        &self,
        connection_id: &bankfeed_model::ConnectionId,
        mode: SyncMode,
        attempt: u32,
    ) -> JobOutcome {
        match self.synchronizer.sync(connection_id, mode).await {
            Ok(_) => JobOutcome::Complete,
            Err(SyncError::ConnectionNotFound { .. }) => {
                tracing::info!(connection = %connection_id, "discarding job for missing connection");
                JobOutcome::Discard {
                    reason: "connection_not_found".into(),
                }
            }
            Err(SyncError::RateLimited { retry_after }) => {
                let delay = self.config.backoff.snooze_for(retry_after, attempt);
                tracing::info!(
                    connection = %connection_id,
                    snooze_seconds = delay.as_secs(),
                    "rate limited, snoozing"
                );
                JobOutcome::Snooze {
                    seconds: delay.as_secs(),
                }
            }
            Err(error) => JobOutcome::Retry {
                error: format!("{}: {error}", error.kind().as_str()),
            },
        }
    }
}

impl<P: ProviderClient, S: Store> Worker<P, S, MemoryQueue> {
    /// Drives immediately-ready jobs off the in-memory queue until none
    /// remain, applying the queue-level policy: retries re-enqueue with
    /// exponential backoff, snoozes re-enqueue with their delay, and jobs
    /// that exhaust `max_attempts` are dropped. Delayed entries are left
    /// queued for a later pass.
    pub async fn drain(&self) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();
        while let Some(entry) = self.queue.pop_immediate() {
            let outcome = self.handle(&entry.job, entry.attempt).await;
            match &outcome {
                JobOutcome::Complete | JobOutcome::Discard { .. } => {}
                JobOutcome::Retry { error } => {
                    if entry.attempt >= self.config.max_attempts {
                        tracing::warn!(error = %error, attempts = entry.attempt, "job exhausted retries");
                    } else {
                        let delay = self.config.backoff.delay_for_attempt(entry.attempt);
                        self.queue.requeue(entry, Some(delay));
                    }
                }
                JobOutcome::Snooze { seconds } => {
                    self.queue
                        .requeue(entry, Some(std::time::Duration::from_secs(*seconds)));
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use bankfeed_model::{Connection, MemoryStore, Secret};
    use bankfeed_provider::{AccountRecord, BalanceRecord, MockProvider, Page, ProviderError};
    use bankfeed_sync_engine::SyncConfig;
    use std::time::Duration;

    fn account_record(id: &str) -> AccountRecord {
        AccountRecord {
            id: id.to_owned(),
            name: "Checking".into(),
            kind: "depository".into(),
            currency: "USD".into(),
            balances: BalanceRecord {
                current: "1.00".into(),
                available: None,
            },
            institution: None,
        }
    }

    struct Fixture {
        provider: Arc<MockProvider>,
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        worker: Worker<MockProvider, MemoryStore, MemoryQueue>,
    }

    fn fixture(config: WorkerConfig) -> Fixture {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let synchronizer = Arc::new(Synchronizer::new(
            SyncConfig::default(),
            Arc::clone(&provider),
            Arc::clone(&store),
        ));
        let worker = Worker::new(
            config,
            synchronizer,
            Arc::clone(&store),
            Arc::clone(&queue),
        );
        Fixture {
            provider,
            store,
            queue,
            worker,
        }
    }

    fn insert_connection(store: &MemoryStore, id: &str, user: &str) {
        store
            .insert_connection(Connection::new(
                id,
                user,
                "inst-1",
                Secret::new("tok"),
                Secret::new("whsec"),
            ))
            .unwrap();
    }

    #[tokio::test]
    async fn missing_connection_discards() {
        let f = fixture(WorkerConfig::default());
        let outcome = f
            .worker
            .handle(&Job::sync("conn-ghost", SyncMode::Incremental), 1)
            .await;
        assert_eq!(
            outcome,
            JobOutcome::Discard {
                reason: "connection_not_found".into()
            }
        );
    }

    #[tokio::test]
    async fn rate_limit_snoozes_at_least_the_suggestion() {
        let config = WorkerConfig::default().with_backoff(BackoffPolicy::new(
            Duration::from_secs(5),
            Duration::from_secs(1800),
        ));
        let f = fixture(config);
        insert_connection(&f.store, "conn-1", "user-1");
        f.provider.push_accounts_error(ProviderError::http_with_headers(
            429,
            [("Retry-After".to_owned(), "30".to_owned())]
                .into_iter()
                .collect(),
            "rate limit exceeded",
        ));

        let outcome = f
            .worker
            .handle(&Job::sync("conn-1", SyncMode::Incremental), 1)
            .await;
        let JobOutcome::Snooze { seconds } = &outcome else {
            panic!("expected snooze, got {outcome:?}");
        };
        assert!(*seconds >= 30);
    }

    #[tokio::test]
    async fn provider_failure_retries() {
        let f = fixture(WorkerConfig::default());
        insert_connection(&f.store, "conn-1", "user-1");
        f.provider
            .push_accounts_error(ProviderError::transport("connection reset"));

        let outcome = f
            .worker
            .handle(&Job::sync("conn-1", SyncMode::Incremental), 1)
            .await;
        assert!(matches!(outcome, JobOutcome::Retry { .. }));
    }

    #[tokio::test]
    async fn successful_sync_completes() {
        let f = fixture(WorkerConfig::default());
        insert_connection(&f.store, "conn-1", "user-1");
        f.provider
            .push_accounts_page(Page::last(vec![account_record("acct-1")]));
        f.provider.push_transactions_page("acct-1", Page::last(vec![]));

        let outcome = f
            .worker
            .handle(&Job::sync("conn-1", SyncMode::Incremental), 1)
            .await;
        assert_eq!(outcome, JobOutcome::Complete);
    }

    #[tokio::test]
    async fn dispatch_enqueues_one_job_per_due_connection() {
        let f = fixture(WorkerConfig::default());
        insert_connection(&f.store, "conn-1", "user-1");
        insert_connection(&f.store, "conn-2", "user-2");

        let outcome = f.worker.handle(&Job::dispatch(), 1).await;
        assert_eq!(outcome, JobOutcome::Complete);
        assert_eq!(f.queue.len(), 2);

        // A second dispatch while those jobs are live is suppressed by the
        // uniqueness keys.
        let _ = f.worker.handle(&Job::dispatch(), 1).await;
        assert_eq!(f.queue.len(), 2);
    }

    #[tokio::test]
    async fn drain_runs_enqueued_jobs_and_defers_retries() {
        let f = fixture(WorkerConfig::default());
        insert_connection(&f.store, "conn-1", "user-1");
        // First attempt fails with a transport error; the retry is
        // re-enqueued with a delay and left for a later pass.
        f.provider
            .push_accounts_error(ProviderError::transport("connection reset"));

        let job = Job::sync("conn-1", SyncMode::Incremental);
        assert!(f.queue.enqueue(job.clone(), Some(job.unique_key()), None));

        let outcomes = f.worker.drain().await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], JobOutcome::Retry { .. }));

        let snapshot = f.queue.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].attempt, 2);
        assert!(snapshot[0].delay.is_some());
    }
}
