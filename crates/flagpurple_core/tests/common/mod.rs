#![allow(dead_code)]

use rusqlite::{params, Connection};

pub const SEP: &str = "\u{1f}";

pub fn add_notetype(conn: &Connection, id: i64, name: &str, fields: &[&str], templates: &[&str]) {
    add_notetype_with_config(conn, id, name, fields, templates, &[]);
}

/// `config` is the raw notetype config blob (`[0x08, 0x01]` marks cloze).
pub fn add_notetype_with_config(
    conn: &Connection,
    id: i64,
    name: &str,
    fields: &[&str],
    templates: &[&str],
    config: &[u8],
) {
    conn.execute(
        "INSERT INTO notetypes (id, name, mtime_secs, usn, config) VALUES (?1, ?2, 0, 0, ?3);",
        params![id, name, config],
    )
    .unwrap();
    for (ord, field) in fields.iter().enumerate() {
        conn.execute(
            "INSERT INTO fields (ntid, ord, name, config) VALUES (?1, ?2, ?3, x'');",
            params![id, ord as i64, field],
        )
        .unwrap();
    }
    for (ord, template) in templates.iter().enumerate() {
        conn.execute(
            "INSERT INTO templates (ntid, ord, name, mtime_secs, usn, config)
             VALUES (?1, ?2, ?3, 0, 0, x'');",
            params![id, ord as i64, template],
        )
        .unwrap();
    }
}

/// Inserts a note plus one card per template ord; card ids are `note_id * 10 + ord`.
pub fn add_note(conn: &Connection, id: i64, ntid: i64, fields: &[&str], tags: &[&str], cards: i64) {
    let flds = fields.join(SEP);
    let stored_tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" {} ", tags.join(" "))
    };
    conn.execute(
        "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
         VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, 0, 0, 0, '');",
        params![id, format!("guid-{id}"), ntid, stored_tags, flds],
    )
    .unwrap();
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO tags (tag, usn, collapsed, config) VALUES (?1, 0, 0, NULL);",
            [tag],
        )
        .unwrap();
    }
    for ord in 0..cards {
        conn.execute(
            "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, lapses, left, odue, odid, flags, data)
             VALUES (?1, ?2, 1, ?3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, '');",
            params![id * 10 + ord, id, ord],
        )
        .unwrap();
    }
}

/// `(queue, flags)` of one card.
pub fn card_state(conn: &Connection, card_id: i64) -> (i64, i64) {
    conn.query_row(
        "SELECT queue, flags FROM cards WHERE id = ?1;",
        [card_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

/// Raw `(flds, tags)` of one note.
pub fn note_row(conn: &Connection, note_id: i64) -> (String, String) {
    conn.query_row(
        "SELECT flds, tags FROM notes WHERE id = ?1;",
        [note_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

pub fn registered_tags(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("SELECT tag FROM tags ORDER BY tag;").unwrap();
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap();
    rows.map(Result::unwrap).collect()
}
