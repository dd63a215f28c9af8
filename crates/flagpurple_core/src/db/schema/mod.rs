//! Collection schema creation and version gate.
//!
//! # Responsibility
//! - Create the collection tables for a brand-new (empty) database.
//! - Reject databases that are not collections, or whose `col.ver` this
//!   binary cannot read safely.
//!
//! # Invariants
//! - Existing databases are never altered by schema bootstrap.
//! - Creation runs in a single transaction.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// Oldest collection schema with `notetypes`/`fields`/`templates` tables.
pub const SCHEMA_VERSION_MIN: u32 = 15;
/// Newest collection schema this binary understands.
pub const SCHEMA_VERSION_MAX: u32 = 18;

const COLLECTION_SCHEMA_SQL: &str = include_str!("collection.sql");

/// Creates the collection schema in an empty database.
///
/// A database that already holds a collection is left as is; a non-empty
/// database without `col` is rejected with `NotACollection`.
pub fn create_schema(conn: &mut Connection) -> DbResult<()> {
    if table_exists(conn, "col")? {
        return Ok(());
    }
    if table_count(conn)? > 0 {
        return Err(DbError::NotACollection);
    }
    let tx = conn.transaction()?;
    tx.execute_batch(COLLECTION_SCHEMA_SQL)?;
    tx.commit()?;
    Ok(())
}

/// Checks that the database is a collection with a supported version.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    if !table_exists(conn, "col")? {
        return Err(DbError::NotACollection);
    }
    let version = collection_version(conn)?;
    if !(SCHEMA_VERSION_MIN..=SCHEMA_VERSION_MAX).contains(&version) {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            supported_min: SCHEMA_VERSION_MIN,
            supported_max: SCHEMA_VERSION_MAX,
        });
    }
    Ok(())
}

fn table_count(conn: &Connection) -> DbResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table';",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Reads the collection schema version from `col.ver`.
pub fn collection_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("SELECT ver FROM col LIMIT 1;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Returns whether `table` exists in the main schema.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Returns whether `table` declares `column`.
pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
