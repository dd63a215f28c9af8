//! Note domain model.
//!
//! # Responsibility
//! - Hold one note snapshot: notetype name, ordered fields and tags.
//! - Provide field/tag helpers used by deduplication and tag maintenance.
//!
//! # Invariants
//! - Field names are unique within one note.
//! - Tags are unique by case-insensitive comparison.
//! - A `Note` is a detached snapshot; changes only reach storage through
//!   `CollectionRepository::update_note`.

/// Stable note identifier (epoch-millisecond id in Anki collections).
pub type NoteId = i64;

/// Separator between hierarchical tag components.
pub const TAG_SEPARATOR: &str = "::";

/// One named field value on a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

/// Snapshot of one collection note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Stable note id.
    pub id: NoteId,
    /// Name of the notetype this note was created from.
    pub notetype: String,
    fields: Vec<NoteField>,
    tags: Vec<String>,
}

impl Note {
    /// Creates a note snapshot from ordered `(name, value)` field pairs.
    pub fn new<N, V>(
        id: NoteId,
        notetype: impl Into<String>,
        fields: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            id,
            notetype: notetype.into(),
            fields: fields
                .into_iter()
                .map(|(name, value)| NoteField {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
            tags: Vec::new(),
        }
    }

    /// Returns a copy of this note carrying `tags` (deduplicated).
    pub fn with_tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        for tag in tags {
            self.add_tag(tag);
        }
        self
    }

    /// Returns the value of field `name`, or `None` when the notetype lacks it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Overwrites field `name`. Returns `false` when the field does not exist.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(field) => {
                field.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Ordered fields of this note.
    pub fn fields(&self) -> &[NoteField] {
        &self.fields
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns whether the note carries `tag` (case-insensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|current| current.eq_ignore_ascii_case(tag))
    }

    /// Returns whether any tag starts with `prefix`.
    pub fn has_tag_with_prefix(&self, prefix: &str) -> bool {
        self.tags.iter().any(|tag| tag.starts_with(prefix))
    }

    /// Adds `tag` unless it is blank or already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() || self.has_tag(trimmed) {
            return false;
        }
        self.tags.push(trimmed.to_string());
        true
    }

    /// Replaces the full tag list, keeping first occurrences only.
    pub fn set_tags<T: Into<String>>(&mut self, tags: impl IntoIterator<Item = T>) {
        self.tags.clear();
        for tag in tags {
            self.add_tag(tag);
        }
    }
}

/// Returns whether `tag` equals `name` or is a `::` child of it (case-insensitive).
pub fn tag_matches_or_descends(tag: &str, name: &str) -> bool {
    if tag.eq_ignore_ascii_case(name) {
        return true;
    }
    let prefix_len = name.len() + TAG_SEPARATOR.len();
    tag.len() > prefix_len
        && tag.is_char_boundary(name.len())
        && tag[..name.len()].eq_ignore_ascii_case(name)
        && tag[name.len()..].starts_with(TAG_SEPARATOR)
}

/// Rewrites `tag` when it equals `old` or descends from it; `None` otherwise.
pub fn rename_tag_value(tag: &str, old: &str, new: &str) -> Option<String> {
    if !tag_matches_or_descends(tag, old) {
        return None;
    }
    Some(format!("{new}{}", &tag[old.len()..]))
}

#[cfg(test)]
mod tests {
    use super::{rename_tag_value, tag_matches_or_descends, Note};

    fn sample() -> Note {
        Note::new(7, "SpoonFedNote", [("Hanzi", "我去。"), ("Audio", "")])
    }

    #[test]
    fn field_lookup_and_update_respect_existing_names() {
        let mut note = sample();
        assert_eq!(note.field("Hanzi"), Some("我去。"));
        assert_eq!(note.field("Missing"), None);

        assert!(note.set_field("Audio", "[sound:a.mp3]"));
        assert_eq!(note.field("Audio"), Some("[sound:a.mp3]"));
        assert!(!note.set_field("Missing", "x"));
    }

    #[test]
    fn add_tag_skips_blank_and_case_insensitive_duplicates() {
        let mut note = sample();
        assert!(note.add_tag("Vocab::HSK1"));
        assert!(!note.add_tag("vocab::hsk1"));
        assert!(!note.add_tag("   "));
        assert_eq!(note.tags(), ["Vocab::HSK1".to_string()]);
    }

    #[test]
    fn prefix_detection_is_plain_starts_with() {
        let note = sample().with_tags(["duplicate-audio::example1::42"]);
        assert!(note.has_tag_with_prefix("duplicate-audio::example1::"));
        assert!(!note.has_tag_with_prefix("duplicate-audio::example2::"));
    }

    #[test]
    fn rename_covers_exact_match_and_children_only() {
        assert_eq!(
            rename_tag_value("a:b", "a:b", "a::b").as_deref(),
            Some("a::b")
        );
        assert_eq!(
            rename_tag_value("Parent::child", "parent", "root").as_deref(),
            Some("root::child")
        );
        assert_eq!(rename_tag_value("parental", "parent", "root"), None);
        assert!(!tag_matches_or_descends("parent:child", "parent"));
    }
}
