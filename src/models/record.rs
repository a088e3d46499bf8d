use crate::core::duration;
use crate::errors::WriteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque record identifier, assigned by the store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier (used by the bundled stores).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of a record namespace (`attendance/{userId}/records`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One check-in/check-out pair.
///
/// Serialized with the camelCase field names of the persisted schema
/// (`checkedInAt`, `checkedOutAt`, `checkInLocation`, `checkOutLocation`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub check_in_location: String,
    pub check_out_location: Option<String>,
}

impl AttendanceRecord {
    /// An open record is an ongoing session.
    pub fn is_open(&self) -> bool {
        self.checked_out_at.is_none()
    }

    /// Formatted duration of a closed record, `"-"` while still open.
    pub fn duration(&self) -> String {
        duration::duration(Some(self.checked_in_at), self.checked_out_at)
    }

    /// Apply the single allowed mutation: the check-out transition.
    pub fn apply_checkout(&mut self, patch: &RecordPatch) -> Result<(), WriteError> {
        if !self.is_open() {
            return Err(WriteError::AlreadyClosed(self.id.clone()));
        }
        if patch.checked_out_at <= self.checked_in_at {
            return Err(WriteError::NonMonotonic(self.id.clone()));
        }
        self.checked_out_at = Some(patch.checked_out_at);
        self.check_out_location = Some(patch.check_out_location.clone());
        Ok(())
    }
}

/// Fields supplied by a check-in. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub checked_in_at: DateTime<Utc>,
    pub check_in_location: String,
}

impl NewRecord {
    pub fn into_record(self, id: RecordId) -> AttendanceRecord {
        AttendanceRecord {
            id,
            checked_in_at: self.checked_in_at,
            checked_out_at: None,
            check_in_location: self.check_in_location,
            check_out_location: None,
        }
    }
}

/// Partial update written by a check-out.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    pub checked_out_at: DateTime<Utc>,
    pub check_out_location: String,
}

/// Order a snapshot the way subscribers receive it: `checkedInAt` descending.
pub fn order_newest_first(records: &mut [AttendanceRecord]) {
    records.sort_by(|a, b| {
        b.checked_in_at
            .cmp(&a.checked_in_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
