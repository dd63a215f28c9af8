//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the two collection maintenance operations to Dart via FRB.
//! - Convert core reports and errors into flat response envelopes.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Failures are reported as `ok = false` with a readable message.

use flagpurple_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    CollectionService, SqliteCollectionRepository,
};
use std::path::PathBuf;

const COLLECTION_PATH_ENV: &str = "FLAGPURPLE_COLLECTION_PATH";

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// `level` is one of `trace|debug|info|warn|error`; `log_dir` must be
/// absolute. Returns an empty string on success, the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Result envelope of `process_duplicates`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateActionResponse {
    pub ok: bool,
    /// Human-readable summary or error.
    pub message: String,
    pub keys_scanned: u32,
    pub tags_added: u32,
    /// Audio fields filled, pre-pass and propagation combined.
    pub audio_written: u32,
    pub cards_flagged: u32,
    pub conflicts: u32,
}

/// Result envelope of `fix_tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFixResponse {
    pub ok: bool,
    pub message: String,
    pub removed: u32,
    pub renamed: u32,
}

/// Runs duplicate processing with the built-in group table.
///
/// An empty `collection_path` falls back to `FLAGPURPLE_COLLECTION_PATH`.
///
/// # FFI contract
/// - Sync call; performs blocking database IO.
/// - Never panics; failures come back with `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn process_duplicates(collection_path: String) -> DuplicateActionResponse {
    let outcome = with_service(&collection_path, |service| {
        service.process_duplicates().map_err(|err| err.to_string())
    });
    match outcome {
        Ok(report) => DuplicateActionResponse {
            ok: true,
            message: format!(
                "processed {} notes; {} changes",
                report.notes_scanned,
                report.mutation_count()
            ),
            keys_scanned: saturate(report.keys_scanned),
            tags_added: saturate(report.tags_added),
            audio_written: saturate(report.audio_unified + report.audio_copied),
            cards_flagged: saturate(report.cards_flagged),
            conflicts: saturate(report.keys_with_conflicting_audio),
        },
        Err(message) => DuplicateActionResponse {
            ok: false,
            message,
            ..DuplicateActionResponse::default()
        },
    }
}

/// Repairs legacy duplicate tags.
///
/// An empty `collection_path` falls back to `FLAGPURPLE_COLLECTION_PATH`.
#[flutter_rust_bridge::frb(sync)]
pub fn fix_tags(collection_path: String) -> TagFixResponse {
    match with_service(&collection_path, |service| {
        service.fix_tags().map_err(|err| err.to_string())
    }) {
        Ok(report) => TagFixResponse {
            ok: true,
            message: format!("removed {}, renamed {}", report.removed, report.renamed),
            removed: saturate(report.removed),
            renamed: saturate(report.renamed),
        },
        Err(message) => TagFixResponse {
            ok: false,
            message,
            ..TagFixResponse::default()
        },
    }
}

fn resolve_collection_path(raw: &str) -> Result<PathBuf, String> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        return Ok(PathBuf::from(trimmed));
    }
    match std::env::var(COLLECTION_PATH_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(PathBuf::from(value.trim())),
        _ => Err(format!(
            "collection path is empty and {COLLECTION_PATH_ENV} is not set"
        )),
    }
}

fn with_service<T>(
    collection_path: &str,
    f: impl FnOnce(&mut CollectionService<SqliteCollectionRepository<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let path = resolve_collection_path(collection_path)?;
    let mut conn = open_db(&path).map_err(|err| format!("collection open failed: {err}"))?;
    let repo = SqliteCollectionRepository::try_new(&mut conn)
        .map_err(|err| format!("collection init failed: {err}"))?;
    let mut service = CollectionService::new(repo);
    f(&mut service)
}

fn saturate(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
