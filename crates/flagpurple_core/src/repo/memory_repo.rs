//! In-memory collection store.
//!
//! # Responsibility
//! - Provide a dependency-free `CollectionRepository` for tests and embedders.
//! - Apply the same search grammar as the SQLite store.
//!
//! # Invariants
//! - Note and card ids are unique; iteration is id-ascending.
//! - The tag registry always contains every tag present on a note.

use crate::model::card::{Card, CardId, FLAG_MAX};
use crate::model::note::{rename_tag_value, tag_matches_or_descends, Note, NoteId};
use crate::repo::{sort_tags, CollectionRepository, RepoError, RepoResult};
use crate::search::parse_query;
use std::collections::BTreeMap;

/// Collection held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollectionRepository {
    notes: BTreeMap<NoteId, Note>,
    cards: BTreeMap<CardId, Card>,
    registered_tags: Vec<String>,
    next_id: i64,
}

impl MemoryCollectionRepository {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Inserts `note` as-is (keeping its id) and registers its tags.
    pub fn insert_note(&mut self, note: Note) -> NoteId {
        let id = note.id;
        self.next_id = self.next_id.max(id + 1);
        self.register_tags(note.tags());
        self.notes.insert(id, note);
        id
    }

    /// Creates a card for `note_id` using template `template` at `ord`.
    pub fn add_card(
        &mut self,
        note_id: NoteId,
        ord: u32,
        template: impl Into<String>,
    ) -> RepoResult<CardId> {
        if !self.notes.contains_key(&note_id) {
            return Err(RepoError::NoteNotFound(note_id));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.cards.insert(
            id,
            Card {
                id,
                note_id,
                ord,
                template: template.into(),
                suspended: false,
                flag: 0,
            },
        );
        Ok(id)
    }

    /// Registers a tag without attaching it to any note.
    pub fn register_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        self.register_tags(std::slice::from_ref(&tag));
    }

    /// Cards generated from `note_id`, id-ascending.
    pub fn cards_of(&self, note_id: NoteId) -> Vec<Card> {
        self.cards
            .values()
            .filter(|card| card.note_id == note_id)
            .cloned()
            .collect()
    }

    fn register_tags(&mut self, tags: &[String]) {
        for tag in tags {
            if !self
                .registered_tags
                .iter()
                .any(|known| known.eq_ignore_ascii_case(tag))
            {
                self.registered_tags.push(tag.clone());
            }
        }
    }

    fn card_mut(&mut self, id: CardId) -> RepoResult<&mut Card> {
        self.cards.get_mut(&id).ok_or(RepoError::CardNotFound(id))
    }
}

impl CollectionRepository for MemoryCollectionRepository {
    fn find_notes(&self, query: &str) -> RepoResult<Vec<NoteId>> {
        let search = parse_query(query)?;
        Ok(self
            .notes
            .values()
            .filter(|note| search.matches_note(note, &self.cards_of(note.id)))
            .map(|note| note.id)
            .collect())
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Note> {
        self.notes.get(&id).cloned().ok_or(RepoError::NoteNotFound(id))
    }

    fn update_note(&mut self, note: &Note) -> RepoResult<()> {
        let stored = self
            .notes
            .get_mut(&note.id)
            .ok_or(RepoError::NoteNotFound(note.id))?;
        *stored = note.clone();
        self.register_tags(note.tags());
        Ok(())
    }

    fn find_cards(&self, query: &str) -> RepoResult<Vec<CardId>> {
        let search = parse_query(query)?;
        let mut ids = Vec::new();
        for card in self.cards.values() {
            let note = self
                .notes
                .get(&card.note_id)
                .ok_or_else(|| RepoError::InvalidData(format!("card {} has no note", card.id)))?;
            if search.matches_card(card, note) {
                ids.push(card.id);
            }
        }
        Ok(ids)
    }

    fn get_card(&self, id: CardId) -> RepoResult<Card> {
        self.cards.get(&id).cloned().ok_or(RepoError::CardNotFound(id))
    }

    fn suspend_cards(&mut self, ids: &[CardId]) -> RepoResult<()> {
        for id in ids {
            self.card_mut(*id)?.suspended = true;
        }
        Ok(())
    }

    fn set_user_flag(&mut self, flag: u8, ids: &[CardId]) -> RepoResult<()> {
        if flag > FLAG_MAX {
            return Err(RepoError::InvalidData(format!("flag {flag} out of range")));
        }
        for id in ids {
            self.card_mut(*id)?.flag = flag;
        }
        Ok(())
    }

    fn all_tags(&self) -> RepoResult<Vec<String>> {
        let mut tags = self.registered_tags.clone();
        sort_tags(&mut tags);
        Ok(tags)
    }

    fn rename_tag(&mut self, old: &str, new: &str) -> RepoResult<usize> {
        let mut changed = 0;
        for note in self.notes.values_mut() {
            if !note.tags().iter().any(|tag| tag_matches_or_descends(tag, old)) {
                continue;
            }
            let renamed = note
                .tags()
                .iter()
                .map(|tag| rename_tag_value(tag, old, new).unwrap_or_else(|| tag.clone()))
                .collect::<Vec<_>>();
            note.set_tags(renamed);
            changed += 1;
        }

        let registry = std::mem::take(&mut self.registered_tags);
        let renamed = registry
            .iter()
            .map(|tag| rename_tag_value(tag, old, new).unwrap_or_else(|| tag.clone()))
            .collect::<Vec<_>>();
        self.register_tags(&renamed);
        Ok(changed)
    }

    fn remove_tag(&mut self, tag: &str) -> RepoResult<usize> {
        let mut changed = 0;
        for note in self.notes.values_mut() {
            if !note.tags().iter().any(|current| tag_matches_or_descends(current, tag)) {
                continue;
            }
            let kept = note
                .tags()
                .iter()
                .filter(|current| !tag_matches_or_descends(current, tag))
                .cloned()
                .collect::<Vec<_>>();
            note.set_tags(kept);
            changed += 1;
        }
        self.registered_tags
            .retain(|current| !tag_matches_or_descends(current, tag));
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCollectionRepository;
    use crate::model::card::FLAG_PURPLE;
    use crate::model::note::Note;
    use crate::repo::{CollectionRepository, RepoError};

    fn repo() -> MemoryCollectionRepository {
        let mut repo = MemoryCollectionRepository::new();
        repo.insert_note(
            Note::new(10, "SpoonFedNote", [("Hanzi", "你好"), ("Audio", "")])
                .with_tags(["duplicate-audio:spoon-fed-chinese:3", "vocab::hsk1"]),
        );
        repo.insert_note(Note::new(20, "SpoonFedNote", [("Hanzi", ""), ("Audio", "")]));
        repo.add_card(10, 0, "Listening").unwrap();
        repo.add_card(10, 1, "Reading").unwrap();
        repo
    }

    #[test]
    fn find_notes_applies_search_grammar() {
        let repo = repo();
        assert_eq!(repo.find_notes("note:SpoonFedNote Hanzi:_*").unwrap(), vec![10]);
        assert_eq!(repo.find_notes("note:SpoonFedNote").unwrap(), vec![10, 20]);
    }

    #[test]
    fn suspend_and_flag_are_visible_through_card_search() {
        let mut repo = repo();
        let cards = repo.find_cards("nid:10 card:Listening").unwrap();
        assert_eq!(cards.len(), 1);
        repo.suspend_cards(&cards).unwrap();
        repo.set_user_flag(FLAG_PURPLE, &cards).unwrap();
        assert!(repo
            .find_cards("nid:10 card:Listening -(is:suspended flag:7)")
            .unwrap()
            .is_empty());
        assert!(repo.get_card(cards[0]).unwrap().is_flagged_duplicate());
    }

    #[test]
    fn update_note_registers_new_tags() {
        let mut repo = repo();
        let mut note = repo.get_note(20).unwrap();
        note.add_tag("duplicate-audio::spoon-fed-chinese::10");
        repo.update_note(&note).unwrap();
        assert!(repo
            .all_tags()
            .unwrap()
            .contains(&"duplicate-audio::spoon-fed-chinese::10".to_string()));
    }

    #[test]
    fn rename_and_remove_update_notes_and_registry() {
        let mut repo = repo();
        let renamed = repo
            .rename_tag(
                "duplicate-audio:spoon-fed-chinese:3",
                "duplicate-audio::spoon-fed-chinese::3",
            )
            .unwrap();
        assert_eq!(renamed, 1);
        assert!(repo
            .get_note(10)
            .unwrap()
            .has_tag("duplicate-audio::spoon-fed-chinese::3"));

        assert_eq!(repo.remove_tag("vocab").unwrap(), 1);
        assert_eq!(
            repo.all_tags().unwrap(),
            vec!["duplicate-audio::spoon-fed-chinese::3".to_string()]
        );
    }

    #[test]
    fn missing_ids_are_reported() {
        let mut repo = repo();
        assert!(matches!(repo.get_note(99), Err(RepoError::NoteNotFound(99))));
        assert!(matches!(
            repo.suspend_cards(&[999]),
            Err(RepoError::CardNotFound(999))
        ));
    }
}
