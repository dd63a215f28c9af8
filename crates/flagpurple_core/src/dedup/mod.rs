//! Duplicate-audio detection and canonicalization.
//!
//! # Responsibility
//! - Normalize example text into dedup keys.
//! - Index configured note groups by key, within and across groups.
//! - Unify unambiguous audio, then tag, fill and hide duplicates.
//!
//! # Invariants
//! - Indexes are rebuilt from a fresh collection snapshot on every run.
//! - A second run over an unchanged collection performs no mutations.
//! - Data conflicts are logged and skipped; store failures abort the run
//!   without rolling back writes already made.

use crate::model::group::GroupSpec;
use crate::model::note::{Note, NoteId};
use crate::repo::{CollectionRepository, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod audio;
pub mod canonicalize;
pub mod index;
pub mod normalize;

pub use audio::{unify_audio, AudioPrepass};
pub use canonicalize::{canonicalize, duplicate_card_query};
pub use index::{collect_group, merge_indices, GlobalIndex, GroupIndex, GroupMember, NormalizedKey};
pub use normalize::normalize_example;

pub type DedupResult<T> = Result<T, DedupError>;

/// Errors that abort a duplicate-processing run.
#[derive(Debug)]
pub enum DedupError {
    /// Collection read/write failure.
    Repo(RepoError),
    /// A configured field is absent on a matched note.
    MissingField { note_id: NoteId, field: String },
}

impl Display for DedupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::MissingField { note_id, field } => {
                write!(f, "note {note_id} has no field `{field}`")
            }
        }
    }
}

impl Error for DedupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::MissingField { .. } => None,
        }
    }
}

impl From<RepoError> for DedupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counters describing one duplicate-processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub groups_scanned: usize,
    pub notes_scanned: usize,
    /// Distinct normalized keys across all groups.
    pub keys_scanned: usize,
    pub keys_without_audio: usize,
    pub keys_with_conflicting_audio: usize,
    /// Audio fields filled by the pre-pass.
    pub audio_unified: usize,
    /// Duplicate tags added.
    pub tags_added: usize,
    /// Audio fields filled from a canonical note.
    pub audio_copied: usize,
    /// Cards suspended and flagged.
    pub cards_flagged: usize,
}

impl DedupReport {
    /// Total collection writes requested by the run.
    pub fn mutation_count(&self) -> usize {
        self.audio_unified + self.tags_added + self.audio_copied + self.cards_flagged
    }
}

/// Runs the full pipeline: collect, merge, unify audio, canonicalize.
///
/// `groups` is priority-ordered; later groups are more canonical.
pub fn process_duplicates<R: CollectionRepository>(
    repo: &mut R,
    groups: &[GroupSpec],
) -> DedupResult<DedupReport> {
    let mut report = DedupReport {
        groups_scanned: groups.len(),
        ..DedupReport::default()
    };

    let mut indices = Vec::with_capacity(groups.len());
    for group in groups {
        let index = collect_group(&*repo, group)?;
        report.notes_scanned += index.note_count();
        indices.push(index);
    }

    let global = merge_indices(&indices);
    report.keys_scanned = global.len();

    let prepass = unify_audio(repo, groups, &global)?;
    report.keys_without_audio = prepass.keys_without_audio;
    report.keys_with_conflicting_audio = prepass.conflicted.len();
    report.audio_unified = prepass.written;

    canonicalize(repo, groups, &indices, &prepass.conflicted, &mut report)?;
    Ok(report)
}

pub(crate) fn required_field<'a>(note: &'a Note, field: &str) -> DedupResult<&'a str> {
    note.field(field).ok_or_else(|| DedupError::MissingField {
        note_id: note.id,
        field: field.to_string(),
    })
}
