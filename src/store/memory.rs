//! In-process record store.
//!
//! Every write pushes a fresh snapshot to the user's subscribers before the
//! write returns. `insert_external` and `disconnect` let callers play the
//! part of a second device and of a dropped connection.

use super::{RecordStore, Snapshot, Subscription, SubscriptionSender};
use crate::errors::{StreamError, WriteError};
use crate::models::record::{
    AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId, order_newest_first,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

struct Subscriber {
    user: UserId,
    sender: SubscriptionSender,
}

#[derive(Default)]
struct Inner {
    records: HashMap<UserId, Vec<AttendanceRecord>>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    fn snapshot(&self, user: &UserId) -> Snapshot {
        let mut snap = self.records.get(user).cloned().unwrap_or_default();
        order_newest_first(&mut snap);
        snap
    }

    fn publish(&mut self, user: &UserId) {
        let snap = self.snapshot(user);
        self.subscribers.retain(|s| {
            if &s.user != user {
                return s.sender.is_active();
            }
            s.sender.send(Ok(snap.clone()))
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a complete record as another device would, and notify.
    pub fn insert_external(&self, user: &UserId, record: AttendanceRecord) {
        let mut inner = self.inner.lock();
        inner.records.entry(user.clone()).or_default().push(record);
        inner.publish(user);
    }

    /// Fail every live subscription of `user` and drop it.
    pub fn disconnect(&self, user: &UserId, reason: &str) {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| {
            if &s.user != user {
                return true;
            }
            let _ = s
                .sender
                .send(Err(StreamError::Disconnected(reason.to_string())));
            false
        });
    }

    /// Live subscriptions across all users.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| s.sender.is_active());
        inner.subscribers.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn subscribe(&self, user: &UserId) -> Result<Subscription, StreamError> {
        let (sender, subscription) = Subscription::channel();
        let mut inner = self.inner.lock();
        let _ = sender.send(Ok(inner.snapshot(user)));
        inner.subscribers.push(Subscriber {
            user: user.clone(),
            sender,
        });
        debug!(user = %user, "memory subscription opened");
        Ok(subscription)
    }

    async fn create(&self, user: &UserId, record: NewRecord) -> Result<RecordId, WriteError> {
        let id = RecordId::generate();
        let mut inner = self.inner.lock();
        inner
            .records
            .entry(user.clone())
            .or_default()
            .push(record.into_record(id.clone()));
        inner.publish(user);
        Ok(id)
    }

    async fn update(
        &self,
        user: &UserId,
        id: &RecordId,
        patch: RecordPatch,
    ) -> Result<(), WriteError> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .get_mut(user)
            .and_then(|recs| recs.iter_mut().find(|r| &r.id == id))
            .ok_or_else(|| WriteError::NotFound(id.clone()))?;
        record.apply_checkout(&patch)?;
        inner.publish(user);
        Ok(())
    }

    async fn snapshot(&self, user: &UserId) -> Result<Snapshot, StreamError> {
        Ok(self.inner.lock().snapshot(user))
    }
}
