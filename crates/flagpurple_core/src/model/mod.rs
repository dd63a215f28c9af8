//! Domain model for collection notes, cards and duplicate groups.
//!
//! # Responsibility
//! - Define the note/card shapes shared by every collection store.
//! - Define the immutable group configuration consumed by deduplication.
//!
//! # Invariants
//! - Notes and cards are identified by stable `i64` ids owned by the store.
//! - Field order on a note mirrors its notetype field order.

pub mod card;
pub mod group;
pub mod note;
