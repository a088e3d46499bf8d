// src/export/model.rs

use crate::models::record::AttendanceRecord;
use serde::Serialize;

/// Flat export row, one per record, using the persisted field names.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecordExport {
    pub id: String,
    pub checked_in_at: String,
    pub checked_out_at: Option<String>,
    pub check_in_location: String,
    pub check_out_location: Option<String>,
    pub duration: String,
}

impl From<&AttendanceRecord> for RecordExport {
    fn from(rec: &AttendanceRecord) -> Self {
        Self {
            id: rec.id.to_string(),
            checked_in_at: rec.checked_in_at.to_rfc3339(),
            checked_out_at: rec.checked_out_at.map(|t| t.to_rfc3339()),
            check_in_location: rec.check_in_location.clone(),
            check_out_location: rec.check_out_location.clone(),
            duration: rec.duration(),
        }
    }
}
