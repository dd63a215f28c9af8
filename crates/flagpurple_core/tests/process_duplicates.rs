mod common;

use common::{add_note, add_notetype, card_state, note_row, SEP};
use flagpurple_core::db::open_db_in_memory;
use flagpurple_core::{
    default_group_specs, CollectionService, DedupError, GroupSpec, SqliteCollectionRepository,
};
use rusqlite::Connection;

const ADVANCED: i64 = 1;
const SPOON_FED: i64 = 2;

fn seed(conn: &Connection) {
    add_notetype(
        conn,
        ADVANCED,
        "Chinese (advanced)_",
        &[
            "Example 1",
            "Example 1 Audio",
            "Example 2",
            "Example 2 Audio",
            "Example 3",
            "Example 3 Audio",
        ],
        &[
            "Listening Example 1",
            "Listening Example 2",
            "Listening Example 3",
        ],
    );
    add_notetype(conn, SPOON_FED, "SpoonFedNote", &["Hanzi", "Audio"], &["Listening", "Reading"]);

    add_note(
        conn,
        1,
        ADVANCED,
        &[
            "<span class=\"tone3\">你</span><span class=\"tone3\">好</span><br><br>Nǐ hǎo",
            "",
            "再见",
            "[sound:a.mp3]",
            "",
            "",
        ],
        &[],
        3,
    );
    add_note(conn, 2, ADVANCED, &["你好", "", "", "", "", ""], &[], 3);
    add_note(conn, 3, SPOON_FED, &["<ruby>你<rt>nǐ</rt></ruby>好", "[sound:nihao.mp3]"], &[], 2);
    add_note(conn, 4, SPOON_FED, &["再见", "[sound:b.mp3]"], &[], 2);
    add_note(conn, 5, ADVANCED, &["", "", "再见", "", "", ""], &[], 3);
}

fn field(conn: &Connection, note_id: i64, ord: usize) -> String {
    note_row(conn, note_id)
        .0
        .split(SEP)
        .nth(ord)
        .unwrap_or_default()
        .to_string()
}

fn tags(conn: &Connection, note_id: i64) -> Vec<String> {
    note_row(conn, note_id)
        .1
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[test]
fn default_groups_tag_share_audio_and_hide_duplicates() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&conn);

    let report = {
        let repo = SqliteCollectionRepository::try_new(&mut conn).unwrap();
        CollectionService::new(repo).process_duplicates().unwrap()
    };

    assert_eq!(report.groups_scanned, 5);
    assert_eq!(report.notes_scanned, 6);
    assert_eq!(report.keys_scanned, 2);
    assert_eq!(report.keys_with_conflicting_audio, 1);
    assert_eq!(report.audio_unified, 2);
    assert_eq!(report.audio_copied, 0);
    assert_eq!(report.tags_added, 4);
    assert_eq!(report.cards_flagged, 4);

    // 你好: Hanzi note 3 is canonical for both Example 1 notes.
    for id in [1, 2] {
        assert_eq!(field(&conn, id, 1), "[sound:nihao.mp3]");
        assert!(tags(&conn, id).contains(&"duplicate-audio::example1::3".to_string()));
        let (queue, flags) = card_state(&conn, id * 10);
        assert_eq!((queue, flags & 7), (-1, 7));
    }
    // Only the matching listening card is hidden.
    assert_eq!(card_state(&conn, 22), (0, 0));

    // 再见 has two audio clips: tagged and hidden, but nothing is copied.
    assert!(tags(&conn, 1).contains(&"duplicate-audio::example2::4".to_string()));
    assert!(tags(&conn, 5).contains(&"duplicate-audio::example2::4".to_string()));
    assert_eq!(field(&conn, 5, 3), "");
    assert_eq!(field(&conn, 1, 3), "[sound:a.mp3]");
    assert_eq!(card_state(&conn, 11).0, -1);
    assert_eq!(card_state(&conn, 51).0, -1);
    assert_eq!(card_state(&conn, 12), (0, 0));

    // Canonical notes are left alone.
    for id in [3, 4] {
        assert!(tags(&conn, id).is_empty());
        assert_eq!(card_state(&conn, id * 10), (0, 0));
    }
}

#[test]
fn second_run_changes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCollectionRepository::try_new(&mut conn).unwrap();
    let mut service = CollectionService::new(repo);

    let first = service.process_duplicates().unwrap();
    assert!(first.mutation_count() > 0);
    let second = service.process_duplicates().unwrap();
    assert_eq!(second.mutation_count(), 0);
    assert_eq!(second.keys_scanned, first.keys_scanned);
}

#[test]
fn suspended_but_unflagged_cards_still_get_flagged() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn.execute("UPDATE cards SET queue = -1, flags = 8 WHERE id = 20;", [])
        .unwrap();

    {
        let repo = SqliteCollectionRepository::try_new(&mut conn).unwrap();
        CollectionService::new(repo).process_duplicates().unwrap();
    }
    // Bits above the user flag survive.
    assert_eq!(card_state(&conn, 20), (-1, 15));
}

#[test]
fn missing_audio_field_aborts_with_note_id() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&conn);
    let mut groups = default_group_specs();
    let hanzi: &mut GroupSpec = groups.last_mut().unwrap();
    hanzi.audio_field = "Sound".to_string();

    let repo = SqliteCollectionRepository::try_new(&mut conn).unwrap();
    let mut service = CollectionService::with_groups(repo, groups).unwrap();
    let err = service.process_duplicates().unwrap_err();
    assert!(matches!(err, DedupError::MissingField { ref field, .. } if field == "Sound"));
}
