// src/export/logic.rs

use crate::db::log::ttlog;
use crate::db::pool::DbPool;
use crate::db::queries::load_records;
use crate::errors::{AppError, AppResult};
use crate::export::ExportFormat;
use crate::export::RecordExport;
use crate::export::fs_utils::ensure_writable;
use crate::export::json_csv::{export_csv, export_json};
use crate::models::record::UserId;
use crate::ui::messages::warning;
use std::path::Path;

/// High level export of a user's attendance records.
pub struct ExportLogic;

impl ExportLogic {
    /// Write every record of `user` to `file`, oldest check-in first.
    ///
    /// `file` must be absolute. An existing file is only replaced with
    /// `force` or after confirmation.
    pub fn export(
        pool: &mut DbPool,
        user: &UserId,
        format: ExportFormat,
        file: &str,
        force: bool,
    ) -> AppResult<usize> {
        let path = Path::new(file);

        if !path.is_absolute() {
            return Err(AppError::Export(format!(
                "output file path must be absolute: {file}"
            )));
        }

        ensure_writable(path, force)?;

        let rows = Self::rows(pool, user)?;
        if rows.is_empty() {
            warning("⚠️  No attendance records to export.");
            return Ok(0);
        }

        match format {
            ExportFormat::Csv => export_csv(&rows, path)?,
            ExportFormat::Json => export_json(&rows, path)?,
        }

        ttlog(
            &pool.conn,
            "export",
            format.as_str(),
            &format!("{} record(s) of {} → {}", rows.len(), user, path.display()),
        )?;

        Ok(rows.len())
    }

    /// Export rows in chronological order.
    pub fn rows(pool: &mut DbPool, user: &UserId) -> AppResult<Vec<RecordExport>> {
        let mut records = load_records(&pool.conn, user)?;
        records.reverse();
        Ok(records.iter().map(RecordExport::from).collect())
    }
}
