//! Record stream adapter: the narrow persistence interface the session
//! manager consumes.
//!
//! A subscription delivers the user's full record set (newest check-in
//! first) on every change. It is released explicitly through its
//! [`SubscriptionHandle`]; nothing is delivered after `unsubscribe`.

pub mod memory;
pub mod sqlite;

use crate::errors::{StreamError, WriteError};
use crate::models::record::{AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Full ordered record set of one user.
pub type Snapshot = Vec<AttendanceRecord>;

pub type StreamEvent = Result<Snapshot, StreamError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn subscribe(&self, user: &UserId) -> Result<Subscription, StreamError>;

    async fn create(&self, user: &UserId, record: NewRecord) -> Result<RecordId, WriteError>;

    /// Apply the check-out patch. Unknown ids are an explicit `NotFound`.
    async fn update(
        &self,
        user: &UserId,
        id: &RecordId,
        patch: RecordPatch,
    ) -> Result<(), WriteError>;

    /// One-shot read of the current record set.
    async fn snapshot(&self, user: &UserId) -> Result<Snapshot, StreamError>;
}

/// Cancellation handle of a subscription. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

pub struct Subscription {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<StreamEvent>, handle: SubscriptionHandle) -> Self {
        Self { events, handle }
    }

    /// Channel-backed subscription; the returned sender feeds it.
    pub fn channel() -> (SubscriptionSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new();
        (
            SubscriptionSender {
                tx,
                handle: handle.clone(),
            },
            Self::new(rx, handle),
        )
    }

    /// Next snapshot or stream error. `None` once unsubscribed or closed.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if !self.handle.is_active() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.handle.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

/// Producer side of a [`Subscription`], held by store implementations.
#[derive(Debug, Clone)]
pub struct SubscriptionSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
    handle: SubscriptionHandle,
}

impl SubscriptionSender {
    /// Deliver an event. Returns `false` once the subscriber is gone, so the
    /// store can prune it.
    pub fn send(&self, event: StreamEvent) -> bool {
        if !self.handle.is_active() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active() && !self.tx.is_closed()
    }

    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.handle.cancelled() => {}
            () = self.tx.closed() => {}
        }
    }
}
