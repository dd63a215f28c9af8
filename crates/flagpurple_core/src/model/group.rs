//! Duplicate-group configuration record.
//!
//! # Invariants
//! - A `GroupSpec` is immutable for one invocation.
//! - Position in the ordered group list encodes priority: later entries are
//!   more canonical audio sources than earlier ones.

use serde::{Deserialize, Serialize};

/// Configuration for one family of notes to deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Human-readable group name used in logs and reports.
    pub name: String,
    /// Collection search selecting the group's notes.
    pub query: String,
    /// Tag prefix; duplicates receive `{tag_prefix}{canonical_note_id}`.
    pub tag_prefix: String,
    /// Template name of the listening cards to suspend on duplicates.
    pub card_name: String,
    /// Field holding the example text that forms the dedup key.
    pub text_field: String,
    /// Field holding the `[sound:...]` audio reference.
    pub audio_field: String,
}

impl GroupSpec {
    /// Tag recorded on a duplicate pointing at its canonical note.
    pub fn duplicate_tag(&self, canonical_note_id: i64) -> String {
        format!("{}{canonical_note_id}", self.tag_prefix)
    }
}
