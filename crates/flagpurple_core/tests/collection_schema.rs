use flagpurple_core::db::schema::{collection_version, table_has_column, SCHEMA_VERSION_MAX};
use flagpurple_core::db::schema::table_exists;
use flagpurple_core::db::{create_db, open_db, open_db_in_memory};
use flagpurple_core::{DbError, RepoError, SqliteCollectionRepository};
use rusqlite::Connection;

#[test]
fn fresh_collection_gets_current_schema() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(collection_version(&conn).unwrap(), SCHEMA_VERSION_MAX);
    assert!(table_has_column(&conn, "cards", "flags").unwrap());
    assert!(table_has_column(&conn, "tags", "collapsed").unwrap());
}

#[test]
fn reopening_a_file_keeps_its_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("collection.anki2");
    {
        let conn = create_db(&path).unwrap();
        conn.execute(
            "INSERT INTO notetypes (id, name, mtime_secs, usn, config) VALUES (1, 'Basic', 0, 0, x'');",
            [],
        )
        .unwrap();
    }
    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM notetypes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.anki2");
    drop(create_db(&path).unwrap());
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE col SET ver = 11;", []).unwrap();
    }

    match open_db(&path) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            supported_min,
            supported_max,
        }) => {
            assert_eq!(db_version, 11);
            assert!(supported_min <= supported_max);
        }
        other => panic!("expected version error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_error_and_is_not_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("colection-typo.anki2");

    assert!(matches!(open_db(&path), Err(DbError::Sqlite(_))));
    assert!(!path.exists());
}

#[test]
fn foreign_sqlite_file_is_rejected_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.sqlite3");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE settings (key text PRIMARY KEY, value text);")
            .unwrap();
    }

    assert!(matches!(open_db(&path), Err(DbError::NotACollection)));
    assert!(matches!(create_db(&path), Err(DbError::NotACollection)));

    let conn = Connection::open(&path).unwrap();
    assert!(!table_exists(&conn, "col").unwrap());
    assert!(!table_exists(&conn, "notes").unwrap());
}

#[test]
fn empty_file_is_not_silently_turned_into_a_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.anki2");
    std::fs::write(&path, b"").unwrap();

    assert!(matches!(open_db(&path), Err(DbError::NotACollection)));
    let conn = create_db(&path).unwrap();
    assert_eq!(collection_version(&conn).unwrap(), SCHEMA_VERSION_MAX);
}

#[test]
fn unicase_collation_is_available_on_open() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO tags (tag, usn, collapsed, config) VALUES ('Vocab', 0, 0, NULL);",
        [],
    )
    .unwrap();
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO tags (tag, usn, collapsed, config) VALUES ('vocab', 0, 0, NULL);",
            [],
        )
        .unwrap();
    assert_eq!(inserted, 0);
}

#[test]
fn repository_rejects_connections_without_collection_tables() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE notes (id integer PRIMARY KEY);")
        .unwrap();
    let err = SqliteCollectionRepository::try_new(&mut conn)
        .err()
        .expect("missing tables should fail");
    assert!(matches!(
        err,
        RepoError::MissingRequiredColumn { .. } | RepoError::MissingRequiredTable(_)
    ));
}
