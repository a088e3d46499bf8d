use super::record::RecordId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health of the record subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    /// No snapshot received yet: state is unknown, not Idle.
    Loading,
    Live,
    /// The stream failed; the view shows the last known state.
    Lost { reason: String },
}

/// Derived session state, rebuilt from every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub is_active: bool,
    pub active_record_id: Option<RecordId>,
    pub active_since: Option<DateTime<Utc>>,
    pub elapsed_millis: u64,
    /// Open records in the latest snapshot. More than one means two devices
    /// checked in concurrently.
    pub open_sessions: usize,
    pub sync: SyncStatus,
}

impl SessionView {
    pub fn loading() -> Self {
        Self {
            is_active: false,
            active_record_id: None,
            active_since: None,
            elapsed_millis: 0,
            open_sessions: 0,
            sync: SyncStatus::Loading,
        }
    }

    /// True once at least one snapshot has been applied.
    pub fn is_known(&self) -> bool {
        !matches!(self.sync, SyncStatus::Loading)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.sync, SyncStatus::Live)
    }

    pub fn phase(&self) -> &'static str {
        match (&self.sync, self.is_active) {
            (SyncStatus::Loading, _) => "loading",
            (SyncStatus::Lost { .. }, _) => "sync lost",
            (SyncStatus::Live, true) => "checked in",
            (SyncStatus::Live, false) => "checked out",
        }
    }
}
