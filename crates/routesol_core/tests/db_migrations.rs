use routesol_core::db::migrations::latest_version;
use routesol_core::db::{open_db, open_db_in_memory, ConnectionManager, DbError};
use routesol_core::{Channel, LogChannel, LogContext};
use rusqlite::Connection;

fn connection_log() -> LogChannel {
    LogContext::detached().channel(Channel::Connection)
}

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_object_exists(&conn, "table", "documents");
    assert_object_exists(&conn, "index", "documents_users_username_uq");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routesol.sqlite3");

    let conn_first = open_db(&path, &connection_log()).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path, &connection_log()).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_object_exists(&conn_second, "table", "documents");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, &connection_log()).unwrap_err();
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
fn acquire_on_missing_directory_is_connectivity_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("nested").join("stores.sqlite3");
    let manager =
        ConnectionManager::new(&format!("sqlite://{}", path.display()), connection_log()).unwrap();

    let err = manager.acquire().err().unwrap();
    assert!(err.is_connectivity(), "unexpected error: {err}");
    assert!(matches!(err, DbError::Connectivity { .. }));
    assert!(!path.exists());
}

#[test]
fn releasing_twice_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stores.sqlite3");
    let manager = ConnectionManager::new(path.to_str().unwrap(), connection_log()).unwrap();

    let mut handle = manager.acquire().unwrap();
    assert!(handle.is_open());
    manager.release(&mut handle);
    manager.release(&mut handle);

    assert!(!handle.is_open());
    assert!(matches!(
        handle.connection().err(),
        Some(DbError::HandleReleased)
    ));
}

#[test]
fn verify_lists_collections_with_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stores.sqlite3");
    let manager = ConnectionManager::new(path.to_str().unwrap(), connection_log()).unwrap();

    assert!(manager.verify().unwrap().is_empty());

    manager
        .scoped(|conn| -> Result<(), DbError> {
            conn.execute_batch(
                "INSERT INTO documents (namespace, collection, doc_id, body)
                 VALUES ('StoreInformation', 'Stores', 1, '{}'),
                        ('StoreInformation', 'Stores', 2, '{}'),
                        ('UserInformation', 'Users', 'u-1', '{\"username\":\"amy\"}');",
            )?;
            Ok(())
        })
        .unwrap();

    let summaries = manager.verify().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].namespace, "StoreInformation");
    assert_eq!(summaries[0].collection, "Stores");
    assert_eq!(summaries[0].documents, 2);
    assert_eq!(summaries[1].collection, "Users");
    assert_eq!(summaries[1].documents, 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_object_exists(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
