use crate::errors::{AppError, AppResult, WriteError};
use crate::models::record::{AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};

/// Timestamps are stored as RFC 3339 UTC with millisecond precision, which
/// keeps text ordering equal to time ordering.
pub fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ts_from_db(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidTimestamp(s.to_string()))
}

fn conversion_error(col: usize, err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(err))
}

pub fn map_row(row: &Row) -> Result<AttendanceRecord> {
    let checked_in_raw: String = row.get("checked_in_at")?;
    let checked_out_raw: Option<String> = row.get("checked_out_at")?;

    let checked_in_at = ts_from_db(&checked_in_raw).map_err(|e| conversion_error(2, e))?;
    let checked_out_at = match checked_out_raw {
        Some(raw) => Some(ts_from_db(&raw).map_err(|e| conversion_error(3, e))?),
        None => None,
    };

    Ok(AttendanceRecord {
        id: RecordId::new(row.get::<_, String>("record_id")?),
        checked_in_at,
        checked_out_at,
        check_in_location: row.get("check_in_location")?,
        check_out_location: row.get("check_out_location")?,
    })
}

/// All records of a user, newest check-in first.
pub fn load_records(conn: &Connection, user: &UserId) -> AppResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM records
         WHERE user_id = ?1
         ORDER BY checked_in_at DESC, record_id DESC",
    )?;

    let rows = stmt.query_map([user.as_str()], map_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn load_record(
    conn: &Connection,
    user: &UserId,
    id: &RecordId,
) -> AppResult<Option<AttendanceRecord>> {
    let mut stmt =
        conn.prepare_cached("SELECT * FROM records WHERE user_id = ?1 AND record_id = ?2")?;
    Ok(stmt
        .query_row([user.as_str(), id.as_str()], map_row)
        .optional()?)
}

pub fn insert_record(
    conn: &Connection,
    user: &UserId,
    id: &RecordId,
    rec: &NewRecord,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO records (user_id, record_id, checked_in_at, checked_out_at,
                              check_in_location, check_out_location)
         VALUES (?1, ?2, ?3, NULL, ?4, NULL)",
        params![
            user.as_str(),
            id.as_str(),
            ts_to_db(&rec.checked_in_at),
            rec.check_in_location,
        ],
    )?;
    Ok(())
}

/// Apply the check-out transition inside a transaction.
///
/// The record must exist, still be open, and the check-out must come after
/// the check-in; each violation is reported as its own `WriteError`.
pub fn close_record(
    conn: &mut Connection,
    user: &UserId,
    id: &RecordId,
    patch: &RecordPatch,
) -> AppResult<()> {
    let tx = conn.transaction()?;

    // compare at the stored (millisecond) precision
    let patch = &RecordPatch {
        checked_out_at: patch.checked_out_at.trunc_subsecs(3),
        check_out_location: patch.check_out_location.clone(),
    };

    let mut current =
        load_record(&tx, user, id)?.ok_or_else(|| WriteError::NotFound(id.clone()))?;
    current.apply_checkout(patch)?;

    let changed = tx.execute(
        "UPDATE records
         SET checked_out_at = ?1, check_out_location = ?2
         WHERE user_id = ?3 AND record_id = ?4 AND checked_out_at IS NULL",
        params![
            ts_to_db(&patch.checked_out_at),
            patch.check_out_location,
            user.as_str(),
            id.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(WriteError::AlreadyClosed(id.clone()).into());
    }

    tx.commit()?;
    Ok(())
}
