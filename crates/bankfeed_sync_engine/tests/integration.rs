//! Integration tests across the pipeline: webhook ingestion, the queue
//! bridge, and the synchronizer against a scripted provider.

use bankfeed_model::{Connection, MemoryStore, Secret, Store};
use bankfeed_provider::{
    AccountRecord, BalanceRecord, MockProvider, Page, ProviderError, TransactionRecord,
};
use bankfeed_sync_engine::{SyncConfig, SyncMode, Synchronizer};
use bankfeed_webhook::{Delivery, IgnoreReason, WebhookHandler, WebhookVerifier};
use bankfeed_worker::{BackoffPolicy, Job, JobOutcome, JobQueue, MemoryQueue, Worker, WorkerConfig};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_700_000_000;

struct Pipeline {
    provider: Arc<MockProvider>,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    worker: Worker<MockProvider, MemoryStore, MemoryQueue>,
    handler: WebhookHandler<MemoryStore, MemoryQueue>,
}

fn pipeline() -> Pipeline {
    let provider = Arc::new(MockProvider::new());
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let synchronizer = Arc::new(Synchronizer::new(
        SyncConfig::default(),
        Arc::clone(&provider),
        Arc::clone(&store),
    ));
    let worker = Worker::new(
        WorkerConfig::default().with_backoff(BackoffPolicy::new(
            Duration::from_secs(5),
            Duration::from_secs(1800),
        )),
        synchronizer,
        Arc::clone(&store),
        Arc::clone(&queue),
    );
    let handler = WebhookHandler::new(
        WebhookVerifier::new(),
        Arc::clone(&store),
        Arc::clone(&queue),
    );
    Pipeline {
        provider,
        store,
        queue,
        worker,
        handler,
    }
}

fn webhook_secret() -> Secret {
    Secret::new("whsec_integration")
}

fn insert_connection(store: &MemoryStore, id: &str, user: &str, institution: &str) {
    store
        .insert_connection(Connection::new(
            id,
            user,
            institution,
            Secret::new("tok"),
            webhook_secret(),
        ))
        .unwrap();
}

fn account_record(id: &str, current: &str) -> AccountRecord {
    AccountRecord {
        id: id.to_owned(),
        name: "Checking".into(),
        kind: "depository".into(),
        currency: "USD".into(),
        balances: BalanceRecord {
            current: current.to_owned(),
            available: None,
        },
        institution: None,
    }
}

fn transaction_record(id: &str, amount: &str) -> TransactionRecord {
    TransactionRecord {
        id: id.to_owned(),
        amount: amount.to_owned(),
        currency: "USD".into(),
        description: "COFFEE SHOP".into(),
        posted_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        pending: false,
    }
}

fn signed_header(timestamp: i64, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret().as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn webhook_body(nonce: &str, connection_id: &str) -> Vec<u8> {
    format!(
        r#"{{"nonce":"{nonce}","event":"transactions.updated","connection_id":"{connection_id}"}}"#
    )
    .into_bytes()
}

#[tokio::test]
async fn webhook_drives_a_full_sync() {
    let p = pipeline();
    insert_connection(&p.store, "conn-1", "user-1", "inst-1");
    p.provider
        .push_accounts_page(Page::last(vec![account_record("acct-1", "42.00")]));
    p.provider
        .push_transactions_page("acct-1", Page::last(vec![transaction_record("txn-1", "-1.00")]));

    let body = webhook_body("abc123", "conn-1");
    let delivery = p
        .handler
        .handle_at(&body, &signed_header(NOW, &body), NOW)
        .unwrap();
    assert_eq!(delivery.status(), "ok");
    assert_eq!(p.queue.len(), 1);

    let outcomes = p.worker.drain().await;
    assert_eq!(outcomes, vec![JobOutcome::Complete]);

    let account = p.store.account(&"user-1".into(), "acct-1").unwrap().unwrap();
    assert_eq!(account.balances.current, "42.00".parse().unwrap());
    let txn = p
        .store
        .transaction(&"user-1".into(), "acct-1", "txn-1")
        .unwrap()
        .unwrap();
    assert_eq!(txn.amount, "-1.00".parse().unwrap());

    let conn = p.store.connection(&"conn-1".into()).unwrap().unwrap();
    assert!(conn.last_synced_at.is_some());
    assert!(conn.last_sync_error.is_none());
}

#[tokio::test]
async fn replayed_webhook_enqueues_exactly_one_job() {
    let p = pipeline();
    insert_connection(&p.store, "conn-1", "user-1", "inst-1");

    let body = webhook_body("abc123", "conn-1");
    let header = signed_header(NOW, &body);

    let first = p.handler.handle_at(&body, &header, NOW).unwrap();
    assert_eq!(first.status(), "ok");

    let second = p.handler.handle_at(&body, &header, NOW).unwrap();
    assert_eq!(
        second,
        Delivery::Ignored {
            reason: IgnoreReason::Duplicate
        }
    );
    assert_eq!(second.response_body()["reason"], "duplicate");
    assert_eq!(second.http_status(), 200);

    assert_eq!(p.queue.len(), 1);
}

#[tokio::test]
async fn rate_limit_becomes_a_bounded_snooze() {
    let p = pipeline();
    insert_connection(&p.store, "conn-1", "user-1", "inst-1");
    p.provider.push_accounts_error(ProviderError::http_with_headers(
        429,
        [("Retry-After".to_owned(), "30".to_owned())]
            .into_iter()
            .collect(),
        "rate limit exceeded",
    ));

    let job = Job::sync("conn-1", SyncMode::Incremental);
    assert!(p.queue.enqueue(job.clone(), Some(job.unique_key()), None));

    let outcomes = p.worker.drain().await;
    let JobOutcome::Snooze { seconds } = &outcomes[0] else {
        panic!("expected snooze, got {outcomes:?}");
    };
    assert!(*seconds >= 30);

    // The job is back on the queue, deferred, for a later pass.
    let snapshot = p.queue.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].delay.unwrap() >= Duration::from_secs(30));

    // Cursors and counts untouched; the failure is recorded.
    let conn = p.store.connection(&"conn-1".into()).unwrap().unwrap();
    assert!(conn.last_synced_at.is_none());
    assert!(conn.last_sync_error.is_some());
}

#[tokio::test]
async fn dispatch_fans_out_and_syncs_everything_due() {
    let p = pipeline();
    insert_connection(&p.store, "conn-1", "user-1", "inst-1");
    insert_connection(&p.store, "conn-2", "user-2", "inst-2");
    for _ in 0..2 {
        p.provider
            .push_accounts_page(Page::last(vec![account_record("acct-1", "10.00")]));
        p.provider.push_transactions_page("acct-1", Page::last(vec![]));
    }

    assert!(p.queue.enqueue(Job::dispatch(), Some(Job::dispatch().unique_key()), None));
    let outcomes = p.worker.drain().await;

    // Dispatch plus one sync per connection, all completing.
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| *o == JobOutcome::Complete));

    for (conn, user) in [("conn-1", "user-1"), ("conn-2", "user-2")] {
        let connection = p.store.connection(&conn.into()).unwrap().unwrap();
        assert!(connection.last_synced_at.is_some(), "{conn} not synced");
        assert!(p
            .store
            .account(&user.into(), "acct-1")
            .unwrap()
            .is_some());
    }
}

#[tokio::test]
async fn repeating_the_same_pages_never_duplicates_rows() {
    let p = pipeline();
    insert_connection(&p.store, "conn-1", "user-1", "inst-1");

    let mut cursors = Vec::new();
    for _ in 0..2 {
        p.provider.push_accounts_page(Page::new(
            vec![account_record("acct-1", "42.00")],
            Some("cur-a".into()),
        ));
        p.provider
            .push_accounts_page(Page::last(vec![account_record("acct-2", "7.00")]));
        p.provider.push_transactions_page(
            "acct-1",
            Page::last(vec![transaction_record("txn-1", "-1.00")]),
        );
        p.provider.push_transactions_page(
            "acct-2",
            Page::last(vec![transaction_record("txn-2", "-2.00")]),
        );

        let job = Job::sync("conn-1", SyncMode::Incremental);
        assert!(p.queue.enqueue(job.clone(), Some(job.unique_key()), None));
        let outcomes = p.worker.drain().await;
        assert_eq!(outcomes, vec![JobOutcome::Complete]);

        let conn = p.store.connection(&"conn-1".into()).unwrap().unwrap();
        cursors.push((conn.accounts_cursor.clone(), conn.transactions_cursor.clone()));
    }

    assert_eq!(p.store.account_count(), 2);
    assert_eq!(p.store.transaction_count(), 2);
    assert_eq!(cursors[0], cursors[1]);
}
