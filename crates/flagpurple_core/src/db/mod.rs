//! SQLite collection bootstrap and schema checks.
//!
//! # Responsibility
//! - Open and configure SQLite connections to flashcard collections.
//! - Create the collection schema for empty files and reject unsupported ones.
//!
//! # Invariants
//! - The collection schema version is read from `col.ver`.
//! - Core code must not read/write collection data before the schema check passes.

use rusqlite::Connection;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{create_db, open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The database has no `col` table.
    NotACollection,
    UnsupportedSchemaVersion {
        db_version: u32,
        supported_min: u32,
        supported_max: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::NotACollection => write!(f, "database is not a flashcard collection"),
            Self::UnsupportedSchemaVersion {
                db_version,
                supported_min,
                supported_max,
            } => write!(
                f,
                "collection schema version {db_version} is outside supported range {supported_min}..={supported_max}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::NotACollection | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Registers collations the collection schema declares (`unicase`).
///
/// Safe to call more than once on the same connection.
pub fn register_collations(conn: &Connection) -> DbResult<()> {
    conn.create_collation("unicase", unicase_compare)?;
    Ok(())
}

fn unicase_compare(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}
