//! SQLite-backed collection store over the flashcard collection schema.
//!
//! # Responsibility
//! - Decode `notes`/`cards` rows into snapshots using `notetypes`, `fields`
//!   and `templates` metadata.
//! - Persist note fields/tags, card suspension/flags and tag registry changes.
//!
//! # Invariants
//! - Note fields are stored `\x1f`-separated in notetype field order.
//! - Note tags are stored space-delimited with one leading/trailing space.
//! - A suspended card has `queue = -1`; the user flag lives in `flags & 7`.
//! - Every write stamps `mod` with epoch seconds and `usn = -1`.

use crate::db::register_collations;
use crate::db::schema::{table_exists, table_has_column};
use crate::model::card::{Card, CardId, FLAG_MAX};
use crate::model::note::{rename_tag_value, tag_matches_or_descends, Note, NoteId};
use crate::repo::{sort_tags, CollectionRepository, RepoError, RepoResult};
use crate::search::parse_query;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::{HashMap, HashSet};

const FIELD_SEPARATOR: char = '\x1f';
const QUEUE_SUSPENDED: i64 = -1;
const USER_FLAG_MASK: i64 = 0b111;
// `notetypes.config` is a protobuf message; field 1 (varint) is the kind,
// and kind 1 is cloze. Normal notetypes omit the field.
const CLOZE_KIND_PREFIX: [u8; 2] = [0x08, 0x01];

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("notes", &["id", "mid", "mod", "usn", "tags", "flds"]),
    ("cards", &["id", "nid", "ord", "mod", "usn", "queue", "flags"]),
    ("notetypes", &["id", "name", "config"]),
    ("fields", &["ntid", "ord", "name"]),
    ("templates", &["ntid", "ord", "name"]),
    ("tags", &["tag", "usn", "collapsed", "config"]),
];

/// SQLite-backed collection repository.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    /// Constructs a repository from an opened collection connection.
    ///
    /// # Errors
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not look like a flashcard collection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        register_collations(conn)?;
        ensure_collection_ready(conn)?;
        Ok(Self { conn })
    }

    fn load_notes(&self, pinned: Option<&[NoteId]>) -> RepoResult<Vec<Note>> {
        let field_names = load_field_names(self.conn)?;
        let mut sql = String::from(
            "SELECT n.id, n.mid, n.tags, n.flds, nt.name
             FROM notes n
             LEFT JOIN notetypes nt ON nt.id = n.mid",
        );
        let bind_values = push_id_filter(&mut sql, "n.id", pinned);
        sql.push_str(" ORDER BY n.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            let id: NoteId = row.get(0)?;
            let mid: i64 = row.get(1)?;
            let tags: String = row.get(2)?;
            let flds: String = row.get(3)?;
            let notetype: Option<String> = row.get(4)?;
            let notetype = notetype.ok_or_else(|| {
                RepoError::InvalidData(format!("note {id} references unknown notetype {mid}"))
            })?;
            let names = field_names.get(&mid).map(Vec::as_slice).unwrap_or(&[]);
            notes.push(decode_note(id, notetype, names, &flds, &tags)?);
        }
        Ok(notes)
    }

    fn load_cards(&self, pinned: Option<&[NoteId]>) -> RepoResult<Vec<Card>> {
        let template_names = load_template_names(self.conn)?;
        let cloze_notetypes = load_cloze_notetypes(self.conn)?;
        let mut sql = String::from(
            "SELECT c.id, c.nid, c.ord, c.queue, c.flags, n.mid
             FROM cards c
             INNER JOIN notes n ON n.id = c.nid",
        );
        let bind_values = push_id_filter(&mut sql, "c.nid", pinned);
        sql.push_str(" ORDER BY c.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            let ord: u32 = row.get(2)?;
            let queue: i64 = row.get(3)?;
            let flags: i64 = row.get(4)?;
            let mid: i64 = row.get(5)?;
            let template = card_template_name(&template_names, &cloze_notetypes, mid, ord);
            cards.push(Card {
                id: row.get(0)?,
                note_id: row.get(1)?,
                ord,
                template,
                suspended: queue == QUEUE_SUSPENDED,
                flag: (flags & USER_FLAG_MASK) as u8,
            });
        }
        Ok(cards)
    }

    fn notetype_field_names(&self, note_id: NoteId) -> RepoResult<Vec<String>> {
        let mid: i64 = self
            .conn
            .query_row("SELECT mid FROM notes WHERE id = ?1;", [note_id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or(RepoError::NoteNotFound(note_id))?;
        Ok(load_field_names(self.conn)?
            .remove(&mid)
            .unwrap_or_default())
    }
}

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn find_notes(&self, query: &str) -> RepoResult<Vec<NoteId>> {
        let search = parse_query(query)?;
        let pinned = search.pinned_note_ids();
        let notes = self.load_notes(pinned.as_deref())?;
        let cards_by_note = group_cards_by_note(self.load_cards(pinned.as_deref())?);
        Ok(notes
            .iter()
            .filter(|note| {
                let cards = cards_by_note.get(&note.id).map(Vec::as_slice).unwrap_or(&[]);
                search.matches_note(note, cards)
            })
            .map(|note| note.id)
            .collect())
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Note> {
        self.load_notes(Some(std::slice::from_ref(&id)))?
            .pop()
            .ok_or(RepoError::NoteNotFound(id))
    }

    fn update_note(&mut self, note: &Note) -> RepoResult<()> {
        let names = self.notetype_field_names(note.id)?;
        let mut values = Vec::with_capacity(names.len());
        for name in &names {
            let value = note.field(name).ok_or_else(|| {
                RepoError::InvalidData(format!("note {} is missing field `{name}`", note.id))
            })?;
            if value.contains(FIELD_SEPARATOR) {
                return Err(RepoError::InvalidData(format!(
                    "field `{name}` on note {} contains the field separator",
                    note.id
                )));
            }
            values.push(value);
        }
        let separator = FIELD_SEPARATOR.to_string();
        let flds = values.join(separator.as_str());
        let tags = encode_tags(note)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE notes
             SET
                flds = ?2,
                tags = ?3,
                mod = CAST(strftime('%s', 'now') AS INTEGER),
                usn = -1
             WHERE id = ?1;",
            params![note.id, flds, tags],
        )?;
        for tag in note.tags() {
            tx.execute(
                "INSERT OR IGNORE INTO tags (tag, usn, collapsed, config)
                 VALUES (?1, -1, 0, NULL);",
                [tag.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn find_cards(&self, query: &str) -> RepoResult<Vec<CardId>> {
        let search = parse_query(query)?;
        let pinned = search.pinned_note_ids();
        let notes = self
            .load_notes(pinned.as_deref())?
            .into_iter()
            .map(|note| (note.id, note))
            .collect::<HashMap<_, _>>();
        let mut ids = Vec::new();
        for card in self.load_cards(pinned.as_deref())? {
            let note = notes.get(&card.note_id).ok_or_else(|| {
                RepoError::InvalidData(format!("card {} has no note", card.id))
            })?;
            if search.matches_card(&card, note) {
                ids.push(card.id);
            }
        }
        Ok(ids)
    }

    fn get_card(&self, id: CardId) -> RepoResult<Card> {
        let note_id: NoteId = self
            .conn
            .query_row("SELECT nid FROM cards WHERE id = ?1;", [id], |row| row.get(0))
            .optional()?
            .ok_or(RepoError::CardNotFound(id))?;
        self.load_cards(Some(std::slice::from_ref(&note_id)))?
            .into_iter()
            .find(|card| card.id == id)
            .ok_or(RepoError::CardNotFound(id))
    }

    fn suspend_cards(&mut self, ids: &[CardId]) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for id in ids {
            let changed = tx.execute(
                "UPDATE cards
                 SET
                    queue = ?2,
                    mod = CAST(strftime('%s', 'now') AS INTEGER),
                    usn = -1
                 WHERE id = ?1;",
                params![id, QUEUE_SUSPENDED],
            )?;
            if changed == 0 {
                return Err(RepoError::CardNotFound(*id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_user_flag(&mut self, flag: u8, ids: &[CardId]) -> RepoResult<()> {
        if flag > FLAG_MAX {
            return Err(RepoError::InvalidData(format!("flag {flag} out of range")));
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for id in ids {
            let changed = tx.execute(
                "UPDATE cards
                 SET
                    flags = (flags & ~?2) | ?3,
                    mod = CAST(strftime('%s', 'now') AS INTEGER),
                    usn = -1
                 WHERE id = ?1;",
                params![id, USER_FLAG_MASK, i64::from(flag)],
            )?;
            if changed == 0 {
                return Err(RepoError::CardNotFound(*id));
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn all_tags(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT tag FROM tags;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get::<_, String>(0)?);
        }
        sort_tags(&mut tags);
        Ok(tags)
    }

    fn rename_tag(&mut self, old: &str, new: &str) -> RepoResult<usize> {
        if new.split_whitespace().count() != 1 {
            return Err(RepoError::InvalidData(format!("invalid tag name `{new}`")));
        }
        rewrite_tags(self.conn, |tag| rename_tag_value(tag, old, new).map(Some))
    }

    fn remove_tag(&mut self, tag: &str) -> RepoResult<usize> {
        rewrite_tags(self.conn, |current| {
            tag_matches_or_descends(current, tag).then_some(None)
        })
    }
}

/// Applies `rewrite` to every tag on every note and in the tag registry.
///
/// `rewrite` returns `None` to keep a tag, `Some(None)` to drop it and
/// `Some(Some(new))` to replace it. Runs in one immediate transaction.
fn rewrite_tags(
    conn: &mut Connection,
    rewrite: impl Fn(&str) -> Option<Option<String>>,
) -> RepoResult<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut pending = Vec::new();
    {
        let mut stmt = tx.prepare("SELECT id, tags FROM notes ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: NoteId = row.get(0)?;
            let stored: String = row.get(1)?;
            let mut touched = false;
            let mut next: Vec<String> = Vec::new();
            for tag in stored.split_whitespace() {
                let replacement = match rewrite(tag) {
                    Some(replacement) => {
                        touched = true;
                        replacement
                    }
                    None => Some(tag.to_string()),
                };
                if let Some(value) = replacement {
                    if !next.iter().any(|known| known.eq_ignore_ascii_case(&value)) {
                        next.push(value);
                    }
                }
            }
            if touched {
                pending.push((id, join_tags(&next)));
            }
        }
    }

    for (id, tags) in &pending {
        tx.execute(
            "UPDATE notes
             SET
                tags = ?2,
                mod = CAST(strftime('%s', 'now') AS INTEGER),
                usn = -1
             WHERE id = ?1;",
            params![id, tags],
        )?;
    }

    let registry = {
        let mut stmt = tx.prepare("SELECT tag FROM tags;")?;
        let mut rows = stmt.query([])?;
        let mut registry = Vec::new();
        while let Some(row) = rows.next()? {
            registry.push(row.get::<_, String>(0)?);
        }
        registry
    };
    for tag in registry {
        let Some(replacement) = rewrite(&tag) else {
            continue;
        };
        tx.execute("DELETE FROM tags WHERE tag = ?1;", [tag.as_str()])?;
        if let Some(value) = replacement {
            tx.execute(
                "INSERT OR IGNORE INTO tags (tag, usn, collapsed, config)
                 VALUES (?1, -1, 0, NULL);",
                [value.as_str()],
            )?;
        }
    }

    tx.commit()?;
    Ok(pending.len())
}

fn decode_note(
    id: NoteId,
    notetype: String,
    names: &[String],
    flds: &str,
    tags: &str,
) -> RepoResult<Note> {
    let values = flds.split(FIELD_SEPARATOR).collect::<Vec<_>>();
    if values.len() > names.len() {
        return Err(RepoError::InvalidData(format!(
            "note {id} has {} fields but notetype `{notetype}` declares {}",
            values.len(),
            names.len()
        )));
    }
    let fields = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), values.get(idx).copied().unwrap_or("")))
        .collect::<Vec<_>>();
    Ok(Note::new(id, notetype, fields).with_tags(tags.split_whitespace()))
}

fn encode_tags(note: &Note) -> RepoResult<String> {
    for tag in note.tags() {
        if tag.split_whitespace().count() != 1 {
            return Err(RepoError::InvalidData(format!(
                "tag `{tag}` on note {} contains whitespace",
                note.id
            )));
        }
    }
    Ok(join_tags(note.tags()))
}

fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(" {} ", tags.join(" "))
    }
}

fn push_id_filter(sql: &mut String, column: &str, ids: Option<&[NoteId]>) -> Vec<Value> {
    let Some(ids) = ids else {
        return Vec::new();
    };
    if ids.is_empty() {
        sql.push_str(" WHERE 0 = 1");
        return Vec::new();
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    sql.push_str(&format!(" WHERE {column} IN ({placeholders})"));
    ids.iter().map(|id| Value::Integer(*id)).collect()
}

fn group_cards_by_note(cards: Vec<Card>) -> HashMap<NoteId, Vec<Card>> {
    let mut grouped: HashMap<NoteId, Vec<Card>> = HashMap::new();
    for card in cards {
        grouped.entry(card.note_id).or_default().push(card);
    }
    grouped
}

fn load_field_names(conn: &Connection) -> RepoResult<HashMap<i64, Vec<String>>> {
    let mut stmt = conn.prepare("SELECT ntid, name FROM fields ORDER BY ntid ASC, ord ASC;")?;
    let mut rows = stmt.query([])?;
    let mut names: HashMap<i64, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        names.entry(row.get(0)?).or_default().push(row.get(1)?);
    }
    Ok(names)
}

fn load_template_names(conn: &Connection) -> RepoResult<HashMap<(i64, u32), String>> {
    let mut stmt = conn.prepare("SELECT ntid, ord, name FROM templates;")?;
    let mut rows = stmt.query([])?;
    let mut names = HashMap::new();
    while let Some(row) = rows.next()? {
        names.insert((row.get(0)?, row.get(1)?), row.get(2)?);
    }
    Ok(names)
}

fn load_cloze_notetypes(conn: &Connection) -> RepoResult<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT id, config FROM notetypes;")?;
    let mut rows = stmt.query([])?;
    let mut cloze = HashSet::new();
    while let Some(row) = rows.next()? {
        let config: Option<Vec<u8>> = row.get(1)?;
        if config.is_some_and(|config| config.starts_with(&CLOZE_KIND_PREFIX)) {
            cloze.insert(row.get(0)?);
        }
    }
    Ok(cloze)
}

/// Cloze cards all render the notetype's single template whatever their
/// ord; any other card without a template gets a `Card N` placeholder.
fn card_template_name(
    templates: &HashMap<(i64, u32), String>,
    cloze_notetypes: &HashSet<i64>,
    mid: i64,
    ord: u32,
) -> String {
    if let Some(name) = templates.get(&(mid, ord)) {
        return name.clone();
    }
    if cloze_notetypes.contains(&mid) {
        if let Some(name) = templates.get(&(mid, 0)) {
            return name.clone();
        }
    }
    format!("Card {}", ord + 1)
}

fn ensure_collection_ready(conn: &Connection) -> RepoResult<()> {
    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}
