use circle_core::db::migrations::latest_version;
use circle_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "friends");
    assert_table_exists(&conn, "contact_cache");
    assert_table_exists(&conn, "sync_cursors");
}

#[test]
fn reopening_a_database_file_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("circle.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO sync_cursors (owner_id, sync_token, last_bulk_sync_at)
             VALUES ('owner-1', 'token-1', 1);",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let token: String = second
        .query_row(
            "SELECT sync_token FROM sync_cursors WHERE owner_id = 'owner-1';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(token, "token-1");
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data").join("circle.db");

    let conn = open_db(&path).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert!(path.exists());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn friends_table_rejects_duplicate_external_links_per_owner() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO friends (id, owner_id, name, external_id) VALUES (?1, ?2, ?3, ?4);";

    conn.execute(insert, ["f1", "owner-1", "Ada", "people/c1"])
        .unwrap();
    conn.execute(insert, ["f2", "owner-2", "Ada", "people/c1"])
        .unwrap();
    assert!(conn
        .execute(insert, ["f3", "owner-1", "Grace", "people/c1"])
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
