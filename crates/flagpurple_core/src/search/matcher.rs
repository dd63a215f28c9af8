//! Evaluation of parsed searches against note/card snapshots.
//!
//! # Invariants
//! - Card-level terms evaluated for a note are true when any of the note's
//!   cards satisfies them.
//! - Note-level terms evaluated for a card use the card's owning note.

use crate::model::card::Card;
use crate::model::note::{Note, NoteId, TAG_SEPARATOR};
use crate::search::{SearchNode, SearchTerm};

impl SearchNode {
    /// Returns whether `note` (with its generated `cards`) matches.
    pub fn matches_note(&self, note: &Note, cards: &[Card]) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches_note(note, cards)),
            Self::Or(parts) => parts.iter().any(|part| part.matches_note(note, cards)),
            Self::Not(inner) => !inner.matches_note(note, cards),
            Self::Term(term) if term.is_card_level() => {
                cards.iter().any(|card| term.matches_card(card, note))
            }
            Self::Term(term) => term.matches_note(note),
        }
    }

    /// Returns whether `card`, generated from `note`, matches.
    pub fn matches_card(&self, card: &Card, note: &Note) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches_card(card, note)),
            Self::Or(parts) => parts.iter().any(|part| part.matches_card(card, note)),
            Self::Not(inner) => !inner.matches_card(card, note),
            Self::Term(term) => term.matches_card(card, note),
        }
    }

    /// Note ids every match must belong to, when the search pins them at
    /// top level (`nid:` under the root AND). Lets stores narrow loading.
    pub fn pinned_note_ids(&self) -> Option<Vec<NoteId>> {
        match self {
            Self::Term(SearchTerm::NoteIds(ids)) => Some(ids.clone()),
            Self::And(parts) => parts.iter().find_map(SearchNode::pinned_note_ids),
            _ => None,
        }
    }
}

impl SearchTerm {
    fn is_card_level(&self) -> bool {
        matches!(
            self,
            Self::Template(_) | Self::TemplateOrdinal(_) | Self::Suspended | Self::Flag(_)
        )
    }

    fn matches_card(&self, card: &Card, note: &Note) -> bool {
        match self {
            Self::Template(glob) => glob.is_match(&card.template),
            Self::TemplateOrdinal(ord) => card.ord == *ord,
            Self::Suspended => card.suspended,
            Self::Flag(flag) => card.flag == *flag,
            _ => self.matches_note(note),
        }
    }

    fn matches_note(&self, note: &Note) -> bool {
        match self {
            Self::Notetype(glob) => glob.is_match(&note.notetype),
            Self::NoteIds(ids) => ids.contains(&note.id),
            Self::Tag(glob) => note
                .tags()
                .iter()
                .any(|tag| tag_or_ancestor_matches(tag, |candidate| glob.is_match(candidate))),
            Self::Field { name, value } => {
                let wanted = name.to_lowercase();
                note.fields()
                    .iter()
                    .find(|field| field.name.to_lowercase() == wanted)
                    .is_some_and(|field| value.is_match(&field.value))
            }
            Self::Text(glob) => note.fields().iter().any(|field| glob.is_match(&field.value)),
            Self::Template(_) | Self::TemplateOrdinal(_) | Self::Suspended | Self::Flag(_) => false,
        }
    }
}

fn tag_or_ancestor_matches(tag: &str, mut is_match: impl FnMut(&str) -> bool) -> bool {
    if is_match(tag) {
        return true;
    }
    tag.match_indices(TAG_SEPARATOR)
        .any(|(idx, _)| is_match(&tag[..idx]))
}
