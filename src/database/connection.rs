use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;

/// Handle on one account slot's SQLite file, migrated on open.
///
/// The credential store opens one per operation and drops it straight away,
/// so slot directories can be renamed while no connection is live.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::migrated(conn)
    }

    /// Scratch database for tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
