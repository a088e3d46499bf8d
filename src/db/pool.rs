//! SQLite connection wrapper (lightweight for CLI usage).
//!
//! Several processes may share one database file (two terminals, or two
//! machines on a synced folder), so connections wait on locks instead of
//! failing immediately.

use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DbPool {
    pub conn: Connection,
}

impl DbPool {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(Path::new(path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Counter that changes whenever another connection commits.
    pub fn data_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))
    }
}
