//! Unit tests for the GitDesk database layer (connection + migrations).

use gitdesk::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use gitdesk::database::Database;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_credentials_table() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='credentials'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(exists, "credentials table should exist after migrations");

    let has_display_name: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('credentials') WHERE name='display_name'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(has_display_name, "v2 migration should add display_name");
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    run_all(db.connection()).expect("second run should be a no-op");
    run_all(db.connection()).expect("third run should be a no-op");

    let rows: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
}

#[test]
fn test_file_database_persists_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("account.db");
    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO credentials (id, encrypted_token, iv, auth_tag, login, updated_at) VALUES ('default', x'00', x'00', x'00', 'octocat', 0)",
                [],
            )
            .unwrap();
    }
    let db = Database::open(&path).unwrap();
    let login: String = db
        .connection()
        .query_row("SELECT login FROM credentials", [], |row| row.get(0))
        .unwrap();
    assert_eq!(login, "octocat");
}
