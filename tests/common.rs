#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rattendance::core::geocoding::OfflineGeocoder;
use rattendance::core::{Clock, FixedGeolocator, LocationResolver};
use rattendance::errors::{StreamError, WriteError};
use rattendance::models::coords::Coordinates;
use rattendance::models::record::{AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId};
use rattendance::store::{RecordStore, Snapshot, Subscription, SubscriptionSender};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

pub fn rta() -> Command {
    cargo_bin_cmd!("rattendance")
}

/// Isolated HOME plus a database file inside it.
pub struct Sandbox {
    pub dir: TempDir,
    pub db: String,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir
            .path()
            .join("attendance.sqlite")
            .to_string_lossy()
            .to_string();
        Self { dir, db }
    }

    /// Command bound to this sandbox's HOME and database, acting as alice.
    pub fn cmd(&self) -> Command {
        self.cmd_as("alice")
    }

    pub fn cmd_as(&self, user: &str) -> Command {
        let mut cmd = rta();
        cmd.env("HOME", self.dir.path())
            .env("APPDATA", self.dir.path())
            .env_remove("RUST_LOG")
            .args(["--db", &self.db, "--user", user]);
        cmd
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().to_string()
    }
}

pub fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
}

pub fn user() -> UserId {
    UserId::new("alice")
}

pub fn open_record(id: &str, since: DateTime<Utc>) -> AttendanceRecord {
    AttendanceRecord {
        id: RecordId::new(id),
        checked_in_at: since,
        checked_out_at: None,
        check_in_location: "Office".into(),
        check_out_location: None,
    }
}

pub fn closed_record(id: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> AttendanceRecord {
    AttendanceRecord {
        checked_out_at: Some(until),
        check_out_location: Some("Home".into()),
        ..open_record(id, since)
    }
}

/// Resolver with a fixed position and no address lookup.
pub fn resolver_at(lat: f64, lon: f64) -> LocationResolver {
    let coords = Coordinates::new(lat, lon).unwrap();
    LocationResolver::new(
        Arc::new(FixedGeolocator::new(Some(coords), true)),
        Arc::new(OfflineGeocoder),
    )
}

/// Resolver whose location permission is denied.
pub fn denied_resolver() -> LocationResolver {
    LocationResolver::new(
        Arc::new(FixedGeolocator::new(None, false)),
        Arc::new(OfflineGeocoder),
    )
}

/// Wall clock that follows tokio's (pausable) time from `base`.
pub struct PausedClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl PausedClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        let passed = tokio::time::Instant::now() - self.start;
        self.base + chrono::Duration::from_std(passed).unwrap()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Store driven by the test: snapshots are pushed by hand and writes are
/// only counted, never reflected in the stream.
pub struct ScriptedStore {
    sender: Mutex<Option<SubscriptionSender>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    fail_with: Mutex<Option<WriteError>>,
    gate: Semaphore,
    entered: Notify,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Self::with_gate(Semaphore::MAX_PERMITS)
    }

    /// Writes block until `release` is called.
    pub fn held() -> Arc<Self> {
        Self::with_gate(0)
    }

    fn with_gate(permits: usize) -> Arc<Self> {
        Arc::new(Self {
            sender: Mutex::new(None),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            gate: Semaphore::new(permits),
            entered: Notify::new(),
        })
    }

    pub fn push(&self, records: Vec<AttendanceRecord>) -> bool {
        match self.sender.lock().as_ref() {
            Some(s) => s.send(Ok(records)),
            None => false,
        }
    }

    pub fn break_stream(&self, err: StreamError) -> bool {
        match self.sender.lock().as_ref() {
            Some(s) => s.send(Err(err)),
            None => false,
        }
    }

    pub fn fail_writes(&self, err: WriteError) {
        *self.fail_with.lock() = Some(err);
    }

    pub fn release(&self) {
        self.gate.add_permits(16);
    }

    /// Resolves once a write has reached the store.
    pub async fn write_started(&self) {
        self.entered.notified().await;
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn subscribed(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map(|s| s.is_active())
            .unwrap_or(false)
    }

    async fn pass_gate(&self) -> Result<(), WriteError> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| WriteError::Backend(e.to_string()))?;
        match self.fail_with.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn subscribe(&self, _user: &UserId) -> Result<Subscription, StreamError> {
        let (sender, subscription) = Subscription::channel();
        *self.sender.lock() = Some(sender);
        Ok(subscription)
    }

    async fn create(&self, _user: &UserId, _record: NewRecord) -> Result<RecordId, WriteError> {
        self.pass_gate().await?;
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RecordId::new(format!("r{n}")))
    }

    async fn update(
        &self,
        _user: &UserId,
        _id: &RecordId,
        _patch: RecordPatch,
    ) -> Result<(), WriteError> {
        self.pass_gate().await?;
        let _ = self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn snapshot(&self, _user: &UserId) -> Result<Snapshot, StreamError> {
        Ok(Vec::new())
    }
}
