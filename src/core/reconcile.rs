//! Derive the active session from a full snapshot.
//!
//! Input order is not trusted. When several open records are visible (two
//! devices checked in before either saw the other), the open record with the
//! latest `checked_in_at` is the active one; ties go to the greater id.

use crate::models::record::{AttendanceRecord, RecordId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: RecordId,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciled {
    pub active: Option<ActiveSession>,
    pub open_sessions: usize,
}

pub fn reconcile(records: &[AttendanceRecord]) -> Reconciled {
    let mut open_sessions = 0;
    let mut chosen: Option<&AttendanceRecord> = None;

    for rec in records.iter().filter(|r| r.is_open()) {
        open_sessions += 1;
        chosen = match chosen {
            Some(best)
                if (best.checked_in_at, &best.id) >= (rec.checked_in_at, &rec.id) =>
            {
                Some(best)
            }
            _ => Some(rec),
        };
    }

    Reconciled {
        active: chosen.map(|r| ActiveSession {
            id: r.id.clone(),
            since: r.checked_in_at,
        }),
        open_sessions,
    }
}
