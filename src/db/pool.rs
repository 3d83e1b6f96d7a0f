//! SQLite connection wrapper (lightweight for CLI usage).
//!
//! Every process or thread that writes attendance opens its own `DbPool`;
//! concurrent writers are serialized by SQLite itself, the busy timeout
//! makes them wait instead of failing with `SQLITE_BUSY`.

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
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }
}
