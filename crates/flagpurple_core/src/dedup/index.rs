//! Per-group and cross-group key indexes.
//!
//! # Invariants
//! - Within one `GroupIndex`, every note id appears under exactly one key.
//! - Key order and id order follow first-seen collection scan order.
//! - `GlobalIndex` lists members in group priority order.

use crate::dedup::{normalize_example, required_field, DedupResult};
use crate::model::group::GroupSpec;
use crate::model::note::NoteId;
use crate::repo::CollectionRepository;
use log::debug;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Normalized example text; the dedup identity of a note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Builds the key for raw example HTML.
    pub fn from_example(text: &str) -> Self {
        Self(normalize_example(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NormalizedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Insertion-ordered map from key to values.
#[derive(Debug, Clone)]
struct OrderedBuckets<V> {
    entries: Vec<(NormalizedKey, Vec<V>)>,
    positions: HashMap<NormalizedKey, usize>,
}

impl<V> Default for OrderedBuckets<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<V> OrderedBuckets<V> {
    fn push(&mut self, key: &NormalizedKey, value: V) {
        match self.positions.get(key) {
            Some(&pos) => self.entries[pos].1.push(value),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key.clone(), vec![value]));
            }
        }
    }

    fn get(&self, key: &NormalizedKey) -> Option<&[V]> {
        self.positions
            .get(key)
            .map(|&pos| self.entries[pos].1.as_slice())
    }
}

/// Key index for one configured group.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    buckets: OrderedBuckets<NoteId>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `note_id` under `key`.
    pub fn insert(&mut self, key: &NormalizedKey, note_id: NoteId) {
        self.buckets.push(key, note_id);
    }

    /// Note ids sharing `key`, in scan order.
    pub fn get(&self, key: &NormalizedKey) -> Option<&[NoteId]> {
        self.buckets.get(key)
    }

    pub fn contains_key(&self, key: &NormalizedKey) -> bool {
        self.buckets.positions.contains_key(key)
    }

    /// `(key, note ids)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedKey, &[NoteId])> {
        self.buckets
            .entries
            .iter()
            .map(|(key, ids)| (key, ids.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.entries.is_empty()
    }

    /// Number of indexed notes.
    pub fn note_count(&self) -> usize {
        self.buckets.entries.iter().map(|(_, ids)| ids.len()).sum()
    }
}

/// One note's membership in a group, by group position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub group: usize,
    pub note_id: NoteId,
}

/// Key index across every group.
#[derive(Debug, Clone, Default)]
pub struct GlobalIndex {
    buckets: OrderedBuckets<GroupMember>,
}

impl GlobalIndex {
    /// Members sharing `key`, in group priority order.
    pub fn get(&self, key: &NormalizedKey) -> Option<&[GroupMember]> {
        self.buckets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NormalizedKey, &[GroupMember])> {
        self.buckets
            .entries
            .iter()
            .map(|(key, members)| (key, members.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.entries.is_empty()
    }
}

/// Runs `group`'s query and indexes matching notes by normalized text.
///
/// # Errors
/// - `MissingField` when a matched note lacks `group.text_field`.
pub fn collect_group<R: CollectionRepository>(
    repo: &R,
    group: &GroupSpec,
) -> DedupResult<GroupIndex> {
    let mut index = GroupIndex::new();
    for note_id in repo.find_notes(&group.query)? {
        let note = repo.get_note(note_id)?;
        let key = NormalizedKey::from_example(required_field(&note, &group.text_field)?);
        index.insert(&key, note_id);
    }
    debug!(
        "event=group_collected module=dedup group={:?} notes={} keys={}",
        group.name,
        index.note_count(),
        index.len()
    );
    Ok(index)
}

/// Flattens per-group indexes, in priority order, into one global index.
pub fn merge_indices(indices: &[GroupIndex]) -> GlobalIndex {
    let mut global = GlobalIndex::default();
    for (group, index) in indices.iter().enumerate() {
        for (key, note_ids) in index.iter() {
            for &note_id in note_ids {
                global.buckets.push(key, GroupMember { group, note_id });
            }
        }
    }
    global
}
