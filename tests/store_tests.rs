use rattendance::db::initialize::init_db;
use rattendance::db::log::load_log;
use rattendance::db::migrate::applied_versions;
use rattendance::db::pool::DbPool;
use rattendance::errors::{StreamError, WriteError};
use rattendance::models::record::{AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId};
use rattendance::store::{MemoryStore, RecordStore, SqliteStore, Subscription};
use std::time::Duration;

mod common;
use common::{Sandbox, closed_record, open_record, ts, user};

const POLL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

fn new_record(h: u32) -> NewRecord {
    NewRecord {
        checked_in_at: ts(h, 0, 0),
        check_in_location: "Office".into(),
    }
}

fn patch(h: u32, m: u32) -> RecordPatch {
    RecordPatch {
        checked_out_at: ts(h, m, 0),
        check_out_location: "Home".into(),
    }
}

/// Next snapshot satisfying `pred`, skipping older ones.
async fn next_matching<F>(sub: &mut Subscription, mut pred: F) -> Vec<AttendanceRecord>
where
    F: FnMut(&[AttendanceRecord]) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match sub.next().await {
                Some(Ok(snap)) if pred(&snap) => return snap,
                Some(Ok(_)) => continue,
                other => panic!("stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no matching snapshot")
}

// ---- memory store ----

#[tokio::test]
async fn test_memory_subscription_gets_initial_and_later_snapshots() {
    let store = MemoryStore::new();
    let mut sub = store.subscribe(&user()).await.unwrap();
    assert!(sub.next().await.unwrap().unwrap().is_empty());

    let id = store.create(&user(), new_record(8)).await.unwrap();
    let snap = sub.next().await.unwrap().unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].id, id);
    assert!(snap[0].is_open());

    store.update(&user(), &id, patch(9, 0)).await.unwrap();
    let snap = sub.next().await.unwrap().unwrap();
    assert_eq!(snap[0].checked_out_at, Some(ts(9, 0, 0)));
    assert_eq!(snap[0].check_out_location.as_deref(), Some("Home"));
}

#[tokio::test]
async fn test_memory_snapshots_are_newest_first() {
    let store = MemoryStore::new();
    store.insert_external(&user(), closed_record("a", ts(7, 0, 0), ts(8, 0, 0)));
    store.insert_external(&user(), open_record("b", ts(10, 0, 0)));
    store.insert_external(&user(), closed_record("c", ts(8, 30, 0), ts(9, 0, 0)));

    let ids: Vec<_> = store
        .snapshot(&user())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(
        ids,
        vec![RecordId::new("b"), RecordId::new("c"), RecordId::new("a")]
    );
}

#[tokio::test]
async fn test_memory_update_rejects_invalid_transitions() {
    let store = MemoryStore::new();
    let missing = RecordId::new("missing");
    assert_eq!(
        store.update(&user(), &missing, patch(9, 0)).await,
        Err(WriteError::NotFound(missing))
    );

    let id = store.create(&user(), new_record(8)).await.unwrap();
    assert_eq!(
        store.update(&user(), &id, patch(8, 0)).await,
        Err(WriteError::NonMonotonic(id.clone()))
    );

    store.update(&user(), &id, patch(9, 0)).await.unwrap();
    assert_eq!(
        store.update(&user(), &id, patch(10, 0)).await,
        Err(WriteError::AlreadyClosed(id.clone()))
    );
    // the first check-out stays
    let snap = store.snapshot(&user()).await.unwrap();
    assert_eq!(snap[0].checked_out_at, Some(ts(9, 0, 0)));
}

#[tokio::test]
async fn test_memory_unsubscribe_and_disconnect() {
    let store = MemoryStore::new();
    let sub = store.subscribe(&user()).await.unwrap();
    let mut other = store.subscribe(&user()).await.unwrap();
    assert_eq!(store.subscriber_count(), 2);

    sub.handle().unsubscribe();
    assert_eq!(store.subscriber_count(), 1);
    drop(sub);

    let _ = other.next().await;
    store.disconnect(&user(), "gone");
    assert!(matches!(
        other.next().await,
        Some(Err(StreamError::Disconnected(_)))
    ));
    assert_eq!(store.subscriber_count(), 0);
}

// ---- sqlite store ----

#[tokio::test]
async fn test_sqlite_write_errors_are_explicit() {
    let sandbox = Sandbox::new();
    let store = SqliteStore::open(&sandbox.db, POLL).unwrap();

    let missing = RecordId::new("missing");
    assert_eq!(
        store.update(&user(), &missing, patch(9, 0)).await,
        Err(WriteError::NotFound(missing))
    );

    let id = store.create(&user(), new_record(8)).await.unwrap();
    assert_eq!(
        store.update(&user(), &id, patch(7, 0)).await,
        Err(WriteError::NonMonotonic(id.clone()))
    );
    store.update(&user(), &id, patch(9, 30)).await.unwrap();
    assert_eq!(
        store.update(&user(), &id, patch(10, 0)).await,
        Err(WriteError::AlreadyClosed(id.clone()))
    );

    let snap = store.snapshot(&user()).await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].duration(), "01:30:00");
}

#[tokio::test]
async fn test_sqlite_same_millisecond_checkout_is_non_monotonic() {
    let sandbox = Sandbox::new();
    let store = SqliteStore::open(&sandbox.db, POLL).unwrap();
    let start = ts(8, 0, 0);

    let id = store
        .create(
            &user(),
            NewRecord {
                checked_in_at: start + chrono::Duration::microseconds(100),
                check_in_location: "Office".into(),
            },
        )
        .await
        .unwrap();

    let same_ms = RecordPatch {
        checked_out_at: start + chrono::Duration::microseconds(500),
        check_out_location: "Home".into(),
    };
    assert_eq!(
        store.update(&user(), &id, same_ms).await,
        Err(WriteError::NonMonotonic(id.clone()))
    );

    let next_ms = RecordPatch {
        checked_out_at: start + chrono::Duration::microseconds(1_200),
        check_out_location: "Home".into(),
    };
    store.update(&user(), &id, next_ms).await.unwrap();
    let snap = store.snapshot(&user()).await.unwrap();
    assert_eq!(
        snap[0].checked_out_at,
        Some(start + chrono::Duration::milliseconds(1))
    );
}

#[tokio::test]
async fn test_sqlite_local_write_reaches_subscriber() {
    let sandbox = Sandbox::new();
    let store = SqliteStore::open(&sandbox.db, Duration::from_secs(60)).unwrap();
    let mut sub = store.subscribe(&user()).await.unwrap();
    assert!(sub.next().await.unwrap().unwrap().is_empty());

    // pushed without waiting for the (long) poll interval
    let id = store.create(&user(), new_record(8)).await.unwrap();
    let snap = next_matching(&mut sub, |s| s.len() == 1).await;
    assert_eq!(snap[0].id, id);
}

#[tokio::test]
async fn test_sqlite_sees_writes_from_another_connection() {
    let sandbox = Sandbox::new();
    let watcher = SqliteStore::open(&sandbox.db, POLL).unwrap();
    let writer = SqliteStore::open(&sandbox.db, POLL).unwrap();

    let mut sub = watcher.subscribe(&user()).await.unwrap();
    assert!(sub.next().await.unwrap().unwrap().is_empty());

    let id = writer.create(&user(), new_record(8)).await.unwrap();
    let snap = next_matching(&mut sub, |s| s.iter().any(|r| r.id == id)).await;
    assert!(snap[0].is_open());

    writer.update(&user(), &id, patch(12, 0)).await.unwrap();
    let snap = next_matching(&mut sub, |s| s.iter().all(|r| !r.is_open())).await;
    assert_eq!(snap[0].check_out_location.as_deref(), Some("Home"));
}

#[tokio::test]
async fn test_sqlite_users_are_isolated() {
    let sandbox = Sandbox::new();
    let store = SqliteStore::open(&sandbox.db, POLL).unwrap();
    let bob = UserId::new("bob");

    store.create(&user(), new_record(8)).await.unwrap();
    assert!(store.snapshot(&bob).await.unwrap().is_empty());
    assert_eq!(store.snapshot(&user()).await.unwrap().len(), 1);
}

#[test]
fn test_migrations_are_idempotent_and_logged() {
    let sandbox = Sandbox::new();
    let pool = DbPool::new(&sandbox.db).unwrap();
    init_db(&pool.conn).unwrap();
    init_db(&pool.conn).unwrap();

    let versions = applied_versions(&pool.conn).unwrap();
    assert_eq!(
        versions,
        vec![
            "20250301_0001_create_records".to_string(),
            "20250301_0002_index_records_checkin".to_string(),
        ]
    );

    let log = load_log(&pool.conn).unwrap();
    assert_eq!(
        log.iter().filter(|e| e.2 == "migration_applied").count(),
        2
    );
}
