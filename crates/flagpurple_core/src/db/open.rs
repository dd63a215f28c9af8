//! Connection bootstrap utilities for SQLite collections.
//!
//! # Responsibility
//! - Open existing collection files, or create new ones on explicit request.
//! - Register the `unicase` collation declared by the collection schema.
//! - Run the schema check before returning a usable connection.
//!
//! # Invariants
//! - `open_db` never creates a file and never adds tables.
//! - Returned connections can compare `collate unicase` columns.
//! - Returned connections hold a supported, fully created schema.

use super::schema::{create_schema, verify_schema};
use super::{register_collations, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Clone, Copy)]
enum Bootstrap {
    Create,
    VerifyOnly,
}

/// Opens an existing collection file.
///
/// # Errors
/// - `Sqlite` when the file does not exist or cannot be opened read-write.
/// - `NotACollection` when the database has no collection schema.
/// - `UnsupportedSchemaVersion` for collections outside the supported range.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    open_with(
        "file",
        || Connection::open_with_flags(path.as_ref(), flags),
        Bootstrap::VerifyOnly,
    )
}

/// Creates a collection file, or opens it when it already holds a collection.
///
/// Meant for seeding new collections; a non-empty database without a
/// collection schema is rejected untouched.
pub fn create_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(
        "create",
        || Connection::open(path.as_ref()),
        Bootstrap::Create,
    )
}

/// Opens an empty in-memory collection with a freshly created schema.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory, Bootstrap::Create)
}

fn open_with(
    mode: &str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
    bootstrap: Bootstrap,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, bootstrap) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, bootstrap: Bootstrap) -> DbResult<()> {
    register_collations(conn)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    if let Bootstrap::Create = bootstrap {
        create_schema(conn)?;
    }
    verify_schema(conn)
}
