//! Collection store contract and implementations.
//!
//! # Responsibility
//! - Define the narrow capability deduplication needs from a flashcard
//!   collection: search, note read/write, card suspension/flags, tag ops.
//! - Isolate SQLite details from the deduplication core.
//!
//! # Invariants
//! - Every write persists immediately; there is no batching or rollback
//!   across calls.
//! - Search results are ordered by ascending id, stable for one snapshot.

use crate::db::DbError;
use crate::model::card::{Card, CardId};
use crate::model::note::{Note, NoteId};
use crate::search::SearchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for collection reads and writes.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Search(SearchError),
    NoteNotFound(NoteId),
    CardNotFound(CardId),
    /// Required table is missing from the collection.
    MissingRequiredTable(&'static str),
    /// Required column is missing from an expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid snapshot.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::CardNotFound(id) => write!(f, "card not found: {id}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::InvalidData(message) => write!(f, "invalid collection data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Search(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SearchError> for RepoError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

/// Capability surface of a flashcard collection.
pub trait CollectionRepository {
    /// Returns ids of notes matching `query`, ascending.
    fn find_notes(&self, query: &str) -> RepoResult<Vec<NoteId>>;
    /// Loads one note snapshot.
    fn get_note(&self, id: NoteId) -> RepoResult<Note>;
    /// Persists fields and tags of `note`, registering new tags.
    fn update_note(&mut self, note: &Note) -> RepoResult<()>;
    /// Returns ids of cards matching `query`, ascending.
    fn find_cards(&self, query: &str) -> RepoResult<Vec<CardId>>;
    /// Loads one card snapshot.
    fn get_card(&self, id: CardId) -> RepoResult<Card>;
    /// Suspends every card in `ids`.
    fn suspend_cards(&mut self, ids: &[CardId]) -> RepoResult<()>;
    /// Sets the user flag of every card in `ids`.
    fn set_user_flag(&mut self, flag: u8, ids: &[CardId]) -> RepoResult<()>;
    /// Returns every registered tag, sorted case-insensitively.
    fn all_tags(&self) -> RepoResult<Vec<String>>;
    /// Renames `old` (and its `::` children) to `new`. Returns notes changed.
    fn rename_tag(&mut self, old: &str, new: &str) -> RepoResult<usize>;
    /// Removes `tag` (and its `::` children) everywhere. Returns notes changed.
    fn remove_tag(&mut self, tag: &str) -> RepoResult<usize>;
}

pub(crate) fn sort_tags(tags: &mut Vec<String>) {
    tags.sort_by(|left, right| {
        left.to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right))
    });
    tags.dedup_by(|left, right| left.eq_ignore_ascii_case(right));
}
