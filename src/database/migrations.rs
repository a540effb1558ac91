//! Slot database schema, applied in order and recorded in `schema_version`.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

struct Step {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        description: "credentials table",
        sql: "CREATE TABLE IF NOT EXISTS credentials (
                  id TEXT PRIMARY KEY,
                  encrypted_token BLOB NOT NULL,
                  iv BLOB NOT NULL,
                  auth_tag BLOB NOT NULL,
                  login TEXT NOT NULL,
                  avatar_url TEXT,
                  updated_at INTEGER NOT NULL
              );",
    },
    Step {
        version: 2,
        description: "credentials.display_name",
        sql: "ALTER TABLE credentials ADD COLUMN display_name TEXT;",
    },
];

/// Highest version in [`STEPS`].
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Version recorded in the database, or 0 for a fresh file.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

/// Brings the schema up to [`CURRENT_SCHEMA_VERSION`]. Each step commits
/// together with its version row, so a crash never leaves a half-applied step.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let applied = get_schema_version(conn);
    for step in STEPS.iter().filter(|s| s.version > applied) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(step.sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![step.version, Utc::now().timestamp(), step.description],
        )?;
        tx.commit()?;
        debug!(version = step.version, "applied slot schema step");
    }
    Ok(())
}
