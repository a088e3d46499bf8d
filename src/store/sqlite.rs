//! SQLite-backed record store.
//!
//! Local writes wake every subscription immediately. Writes made by other
//! processes sharing the database file are picked up by polling
//! `PRAGMA data_version` every `poll_interval`.

use super::{RecordStore, Snapshot, Subscription, SubscriptionSender};
use crate::db::initialize::init_db;
use crate::db::log::ttlog;
use crate::db::pool::DbPool;
use crate::db::queries::{close_record, insert_record, load_records};
use crate::errors::{AppError, AppResult, StreamError, WriteError};
use crate::models::record::{NewRecord, RecordId, RecordPatch, UserId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub struct SqliteStore {
    pool: Arc<Mutex<DbPool>>,
    poll_interval: Duration,
    /// Bumped after every local commit.
    writes: watch::Sender<u64>,
}

fn write_error(e: AppError) -> WriteError {
    match e {
        AppError::Write(w) => w,
        other => WriteError::Backend(other.to_string()),
    }
}

fn stream_error(e: AppError) -> StreamError {
    StreamError::Backend(e.to_string())
}

impl SqliteStore {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: &str, poll_interval: Duration) -> AppResult<Self> {
        let pool = DbPool::new(path)?;
        init_db(&pool.conn)?;
        Ok(Self::from_pool(pool, poll_interval))
    }

    pub fn from_pool(pool: DbPool, poll_interval: Duration) -> Self {
        let (writes, _) = watch::channel(0);
        Self {
            pool: Arc::new(Mutex::new(pool)),
            poll_interval,
            writes,
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_pool<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut DbPool) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut guard = pool.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| AppError::Other(format!("database task failed: {e}")))?
    }

    fn notify_write(&self) {
        self.writes.send_modify(|n| *n = n.wrapping_add(1));
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn subscribe(&self, user: &UserId) -> Result<Subscription, StreamError> {
        let (sender, subscription) = Subscription::channel();

        // first snapshot is delivered before subscribe returns
        let first_user = user.clone();
        let (first, version) = self
            .with_pool(move |pool| {
                let version = pool.data_version()?;
                Ok((load_records(&pool.conn, &first_user)?, version))
            })
            .await
            .map_err(stream_error)?;
        let _ = sender.send(Ok(first));

        let watcher = Watcher {
            pool: Arc::clone(&self.pool),
            user: user.clone(),
            poll_interval: self.poll_interval,
            writes: self.writes.subscribe(),
            last_version: version,
            sender,
        };
        drop(tokio::spawn(watcher.run()));

        debug!(user = %user, "sqlite subscription opened");
        Ok(subscription)
    }

    async fn create(&self, user: &UserId, record: NewRecord) -> Result<RecordId, WriteError> {
        let user = user.clone();
        let id = RecordId::generate();
        let new_id = id.clone();

        self.with_pool(move |pool| {
            insert_record(&pool.conn, &user, &new_id, &record)?;
            if let Err(e) = ttlog(
                &pool.conn,
                "checkin",
                new_id.as_str(),
                &format!("Checked in at {}", record.check_in_location),
            ) {
                warn!(error = %e, "failed to write internal log");
            }
            Ok(())
        })
        .await
        .map_err(write_error)?;

        self.notify_write();
        Ok(id)
    }

    async fn update(
        &self,
        user: &UserId,
        id: &RecordId,
        patch: RecordPatch,
    ) -> Result<(), WriteError> {
        let user = user.clone();
        let id = id.clone();

        self.with_pool(move |pool| {
            close_record(&mut pool.conn, &user, &id, &patch)?;
            if let Err(e) = ttlog(
                &pool.conn,
                "checkout",
                id.as_str(),
                &format!("Checked out at {}", patch.check_out_location),
            ) {
                warn!(error = %e, "failed to write internal log");
            }
            Ok(())
        })
        .await
        .map_err(write_error)?;

        self.notify_write();
        Ok(())
    }

    async fn snapshot(&self, user: &UserId) -> Result<Snapshot, StreamError> {
        let user = user.clone();
        self.with_pool(move |pool| load_records(&pool.conn, &user))
            .await
            .map_err(stream_error)
    }
}

/// Background task feeding one subscription.
struct Watcher {
    pool: Arc<Mutex<DbPool>>,
    user: UserId,
    poll_interval: Duration,
    writes: watch::Receiver<u64>,
    last_version: i64,
    sender: SubscriptionSender,
}

impl Watcher {
    async fn run(mut self) {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; the initial snapshot is already out
        let _ = poll.tick().await;

        loop {
            let local_write = tokio::select! {
                biased;
                () = self.sender.cancelled() => break,
                changed = self.writes.changed() => {
                    if changed.is_err() {
                        // store dropped
                        let _ = self.sender.send(Err(StreamError::Closed));
                        break;
                    }
                    true
                }
                _ = poll.tick() => false,
            };

            match self.load(local_write).await {
                Ok(Some(snapshot)) => {
                    if !self.sender.send(Ok(snapshot)) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(user = %self.user, error = %e, "record stream read failed");
                    if !self.sender.send(Err(stream_error(e))) {
                        break;
                    }
                }
            }
        }

        debug!(user = %self.user, "sqlite subscription closed");
    }

    /// Fresh snapshot, or `None` when nothing changed since the last poll.
    async fn load(&mut self, force: bool) -> AppResult<Option<Snapshot>> {
        let pool = Arc::clone(&self.pool);
        let user = self.user.clone();
        let last = self.last_version;

        let result = tokio::task::spawn_blocking(move || -> AppResult<(i64, Option<Snapshot>)> {
            let guard = pool.lock();
            let version = guard.data_version()?;
            if !force && version == last {
                return Ok((version, None));
            }
            Ok((version, Some(load_records(&guard.conn, &user)?)))
        })
        .await
        .map_err(|e| AppError::Other(format!("database task failed: {e}")))??;

        self.last_version = result.0;
        Ok(result.1)
    }
}
