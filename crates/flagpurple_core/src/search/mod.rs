//! Collection search grammar shared by every store.
//!
//! # Responsibility
//! - Parse host-style search strings (`note:`, `card:`, `nid:`, field globs).
//! - Evaluate parsed searches against note/card snapshots.
//!
//! # Invariants
//! - Parsing is pure; evaluation never touches storage.
//! - Glob matching is anchored and case-insensitive.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod glob;
pub mod matcher;
pub mod query;

pub use glob::Glob;
pub use query::{escape_search_text, parse_query, SearchNode, SearchTerm};

/// Result type for search parsing.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Query text cannot be parsed by the search grammar.
    InvalidQuery { query: String, message: String },
}

impl SearchError {
    pub(crate) fn invalid(query: &str, message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            query: query.to_string(),
            message: message.into(),
        }
    }
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid search `{query}`: {message}")
            }
        }
    }
}

impl Error for SearchError {}
