//! Core domain logic for flagpurple.
//! Finds duplicate example sentences in a flashcard collection, shares one
//! audio clip between them and hides the redundant listening cards.

pub mod config;
pub mod db;
pub mod dedup;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod tags;

pub use config::{default_group_specs, load_group_specs, parse_group_specs, ConfigError};
pub use db::{create_db, open_db, open_db_in_memory, DbError};
pub use dedup::{normalize_example, process_duplicates, DedupError, DedupReport};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::card::{Card, CardId, FLAG_PURPLE};
pub use model::group::GroupSpec;
pub use model::note::{Note, NoteId};
pub use repo::memory_repo::MemoryCollectionRepository;
pub use repo::sqlite_repo::SqliteCollectionRepository;
pub use repo::{CollectionRepository, RepoError, RepoResult};
pub use search::SearchError;
pub use service::collection_service::CollectionService;
pub use tags::{fix_tags, TagFixReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
