use aggrepo_core::db::migrations::latest_version;
use aggrepo_core::db::{open_db, open_db_in_memory, open_db_with, DbError, DbOptions};
use aggrepo_core::{RepoError, SqliteStore};
use rusqlite::Connection;
use std::time::Duration;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "aggregates");
    assert_table_exists(&conn, "aggregate_relations");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aggrepo.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "aggregates");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn options_are_applied_to_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let options = DbOptions {
        busy_timeout: Duration::from_millis(250),
        foreign_keys: false,
    };

    let conn = open_db_with(dir.path().join("options.db"), &options).unwrap();
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();

    assert_eq!(foreign_keys, 0);
    assert_eq!(busy_timeout, 250);
}

#[test]
fn store_rejects_connections_without_schema() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteStore::new(conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::Db(DbError::MissingRequiredTable("aggregates"))
    ));
}

#[test]
fn deleting_an_aggregate_cascades_to_its_relations() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO aggregates (id, kind, body) VALUES ('a-1', 'order', '{}');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO aggregate_relations (owner_id, relation, body) VALUES ('a-1', 'lines', '[]');",
        [],
    )
    .unwrap();

    conn.execute("DELETE FROM aggregates WHERE id = 'a-1';", [])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM aggregate_relations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn aggregate_bodies_must_be_valid_json() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO aggregates (id, kind, body) VALUES ('a-1', 'order', 'not json');",
        [],
    );
    assert!(result.is_err());
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
