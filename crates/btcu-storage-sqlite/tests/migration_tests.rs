//! Migration tests
//!
//! Verifies the ledger schema on fresh and already-migrated databases.

use btcu_storage_sqlite::migrations::{self, SCHEMA_VERSION};
use rusqlite::Connection;
use tempfile::NamedTempFile;

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_fresh_migration() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    migrations::run_migrations(&conn).unwrap();

    let tables = table_names(&conn);
    for expected in ["ledger_entries", "ledger_meta", "schema_version"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[test]
fn test_migration_idempotency() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    migrations::run_migrations(&conn).unwrap();
    migrations::run_migrations(&conn).unwrap();

    let versions: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(versions, 1);
    assert_eq!(migrations::get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_upgrade_from_v1() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    // A database left at v1 has entries but no meta table
    conn.execute_batch(
        r#"
        CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
        INSERT INTO schema_version (version) VALUES (1);
        CREATE TABLE ledger_entries (
            txid TEXT PRIMARY KEY,
            order_pos INTEGER NOT NULL,
            position TEXT NOT NULL,
            block_hash TEXT,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        INSERT INTO ledger_entries VALUES ('aa', 0, 'unconfirmed', NULL, '{}', 'now');
        "#,
    )
    .unwrap();

    migrations::run_migrations(&conn).unwrap();

    assert!(table_names(&conn).iter().any(|t| t == "ledger_meta"));
    let kept: i64 = conn
        .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kept, 1);
    assert_eq!(migrations::get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_newer_schema_rejected() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    conn.execute_batch(
        "CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
         INSERT INTO schema_version (version) VALUES (99);",
    )
    .unwrap();

    assert!(migrations::run_migrations(&conn).is_err());
}

#[test]
fn test_txid_is_unique() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    migrations::run_migrations(&conn).unwrap();

    let insert = "INSERT INTO ledger_entries (txid, order_pos, position, payload, updated_at)
                  VALUES ('aa', 0, 'unconfirmed', '{}', 'now')";
    conn.execute(insert, []).unwrap();
    assert!(conn.execute(insert, []).is_err());
}

#[test]
fn test_indexes_exist() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    migrations::run_migrations(&conn).unwrap();

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'ledger_entries'")
        .unwrap();
    let indexes: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert!(indexes.contains(&"idx_ledger_entries_order".to_string()));
    assert!(indexes.contains(&"idx_ledger_entries_block".to_string()));
}
