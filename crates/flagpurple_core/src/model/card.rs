//! Card domain model and user flag codes.
//!
//! # Invariants
//! - `flag` is always within `0..=7`; `0` means no flag.
//! - `suspended` mirrors the store's suspension state at read time.

use crate::model::note::NoteId;

/// Stable card identifier.
pub type CardId = i64;

/// No user flag.
pub const FLAG_NONE: u8 = 0;
/// Purple user flag, reserved for duplicate listening cards.
pub const FLAG_PURPLE: u8 = 7;
/// Highest user flag code the collection accepts.
pub const FLAG_MAX: u8 = 7;

/// Snapshot of one reviewable card generated from a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    /// Template ordinal within the notetype (0-based).
    pub ord: u32,
    /// Template (card subtype) name, e.g. `Listening Example 1`.
    pub template: String,
    pub suspended: bool,
    pub flag: u8,
}

impl Card {
    /// Returns whether this card is already hidden as a duplicate.
    pub fn is_flagged_duplicate(&self) -> bool {
        self.suspended && self.flag == FLAG_PURPLE
    }
}
