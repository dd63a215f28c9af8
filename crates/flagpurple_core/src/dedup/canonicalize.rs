//! Canonicalization engine.
//!
//! For every group (priority order) and every key in that group, the
//! canonical note is the first note id found for the key when scanning the
//! groups from the last one back to the current one, inclusive. Every other
//! note in the current group's bucket is then:
//!
//! 1. tagged `{tag_prefix}{canonical_id}` unless a tag with the group's
//!    prefix is already present;
//! 2. given the canonical audio when its own audio field is empty;
//! 3. persisted (tags must be stored before the card search below);
//! 4. stripped from review: its listening cards that are not already both
//!    suspended and purple-flagged get suspended and flagged.

use crate::dedup::{required_field, DedupReport, DedupResult, GroupIndex, NormalizedKey};
use crate::model::card::FLAG_PURPLE;
use crate::model::group::GroupSpec;
use crate::model::note::NoteId;
use crate::repo::CollectionRepository;
use crate::search::escape_search_text;
use log::{debug, info};
use std::collections::HashSet;

/// Applies duplicate tags, audio and card flags for every group.
///
/// `indices[i]` must be the index collected for `groups[i]`. Keys listed in
/// `conflicted` still get tagged and suspended but never receive audio.
///
/// # Errors
/// - `MissingField` when a note lacks its group's audio field.
/// - `Repo` on store failure; earlier mutations stay applied.
pub fn canonicalize<R: CollectionRepository>(
    repo: &mut R,
    groups: &[GroupSpec],
    indices: &[GroupIndex],
    conflicted: &HashSet<NormalizedKey>,
    report: &mut DedupReport,
) -> DedupResult<()> {
    for (position, group) in groups.iter().enumerate() {
        for (key, note_ids) in indices[position].iter() {
            let Some((canonical_group, canonical_id)) = find_canonical(indices, position, key)
            else {
                continue;
            };
            if note_ids.iter().all(|id| *id == canonical_id) {
                continue;
            }
            debug!(
                "event=duplicates_found module=dedup group={:?} key={:?} notes={:?} canonical_group={:?} canonical_note={}",
                group.name,
                key.as_str(),
                note_ids,
                groups[canonical_group].name,
                canonical_id
            );

            let canonical_note = repo.get_note(canonical_id)?;
            let canonical_audio =
                required_field(&canonical_note, &groups[canonical_group].audio_field)?;
            let propagated_audio = if canonical_audio.is_empty() || conflicted.contains(key) {
                None
            } else {
                Some(canonical_audio.to_string())
            };

            for &note_id in note_ids {
                if note_id == canonical_id {
                    continue;
                }
                mark_duplicate(
                    repo,
                    group,
                    note_id,
                    canonical_id,
                    propagated_audio.as_deref(),
                    report,
                )?;
            }
        }
    }
    Ok(())
}

/// Card search selecting `note_id`'s `card_name` cards that are not yet
/// both suspended and purple-flagged.
pub fn duplicate_card_query(note_id: NoteId, card_name: &str) -> String {
    format!(
        "nid:{note_id} \"card:{}\" -(is:suspended flag:{FLAG_PURPLE})",
        escape_search_text(card_name)
    )
}

/// Finds the canonical `(group position, note id)` for `key`, scanning from
/// the last group back to `from` inclusive.
fn find_canonical(
    indices: &[GroupIndex],
    from: usize,
    key: &NormalizedKey,
) -> Option<(usize, NoteId)> {
    (from..indices.len()).rev().find_map(|position| {
        indices[position]
            .get(key)
            .and_then(|ids| ids.first())
            .map(|id| (position, *id))
    })
}

fn mark_duplicate<R: CollectionRepository>(
    repo: &mut R,
    group: &GroupSpec,
    note_id: NoteId,
    canonical_id: NoteId,
    audio: Option<&str>,
    report: &mut DedupReport,
) -> DedupResult<()> {
    let mut note = repo.get_note(note_id)?;
    let own_audio_empty = required_field(&note, &group.audio_field)?.is_empty();
    let mut changed = false;

    if !note.has_tag_with_prefix(&group.tag_prefix) {
        let tag = group.duplicate_tag(canonical_id);
        if note.add_tag(tag.as_str()) {
            info!(
                "event=tag_added module=dedup note_id={} tag={:?}",
                note_id, tag
            );
            report.tags_added += 1;
            changed = true;
        }
    }

    if let Some(audio) = audio {
        if own_audio_empty {
            note.set_field(&group.audio_field, audio);
            info!(
                "event=audio_copied module=dedup note_id={} field={:?} canonical_note={}",
                note_id, group.audio_field, canonical_id
            );
            report.audio_copied += 1;
            changed = true;
        }
    }

    if changed {
        repo.update_note(&note)?;
    }

    let cards = repo.find_cards(&duplicate_card_query(note_id, &group.card_name))?;
    if !cards.is_empty() {
        repo.suspend_cards(&cards)?;
        repo.set_user_flag(FLAG_PURPLE, &cards)?;
        info!(
            "event=cards_flagged module=dedup note_id={} cards={:?} flag={}",
            note_id, cards, FLAG_PURPLE
        );
        report.cards_flagged += cards.len();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{canonicalize, duplicate_card_query, find_canonical};
    use crate::dedup::{collect_group, DedupReport, GroupIndex, NormalizedKey};
    use crate::model::card::FLAG_PURPLE;
    use crate::model::group::GroupSpec;
    use crate::model::note::Note;
    use crate::repo::memory_repo::MemoryCollectionRepository;
    use crate::repo::CollectionRepository;
    use std::collections::HashSet;

    fn group(name: &str) -> GroupSpec {
        GroupSpec {
            name: name.to_string(),
            query: format!("note:{name}"),
            tag_prefix: format!("duplicate-audio::{}::", name.to_lowercase()),
            card_name: format!("Listening {name}"),
            text_field: "Text".to_string(),
            audio_field: "Audio".to_string(),
        }
    }

    fn add(repo: &mut MemoryCollectionRepository, id: i64, notetype: &str, text: &str, audio: &str) {
        repo.insert_note(Note::new(id, notetype, [("Text", text), ("Audio", audio)]));
        repo.add_card(id, 0, format!("Listening {notetype}")).unwrap();
        repo.add_card(id, 1, format!("Reading {notetype}")).unwrap();
    }

    fn run(
        repo: &mut MemoryCollectionRepository,
        groups: &[GroupSpec],
        conflicted: &HashSet<NormalizedKey>,
    ) -> DedupReport {
        let indices = groups
            .iter()
            .map(|group| collect_group(&*repo, group).unwrap())
            .collect::<Vec<_>>();
        let mut report = DedupReport::default();
        canonicalize(repo, groups, &indices, conflicted, &mut report).unwrap();
        report
    }

    #[test]
    fn canonical_comes_from_latest_group_holding_the_key() {
        let key = NormalizedKey::from_example("你好");
        let mut a = GroupIndex::new();
        a.insert(&key, 1);
        a.insert(&key, 2);
        let mut b = GroupIndex::new();
        b.insert(&key, 3);
        let c = GroupIndex::new();
        let indices = [a, b, c];

        assert_eq!(find_canonical(&indices, 0, &key), Some((1, 3)));
        assert_eq!(find_canonical(&indices, 1, &key), Some((1, 3)));
        assert_eq!(find_canonical(&indices, 2, &key), None);
    }

    #[test]
    fn cross_group_duplicates_point_at_later_group() {
        let mut repo = MemoryCollectionRepository::new();
        add(&mut repo, 1, "A", "你好", "");
        add(&mut repo, 2, "A", "你好", "");
        add(&mut repo, 3, "B", "你好", "[sound:nihao.mp3]");
        let groups = [group("A"), group("B")];

        let report = run(&mut repo, &groups, &HashSet::new());
        assert_eq!(report.tags_added, 2);
        assert_eq!(report.audio_copied, 2);
        assert_eq!(report.cards_flagged, 2);

        for id in [1, 2] {
            let note = repo.get_note(id).unwrap();
            assert!(note.has_tag("duplicate-audio::a::3"));
            assert_eq!(note.field("Audio"), Some("[sound:nihao.mp3]"));
            let cards = repo.cards_of(id);
            assert!(cards[0].suspended && cards[0].flag == FLAG_PURPLE);
            assert!(!cards[1].suspended && cards[1].flag == 0);
        }
        let canonical = repo.get_note(3).unwrap();
        assert!(canonical.tags().is_empty());
        assert!(repo.cards_of(3).iter().all(|card| !card.suspended));
    }

    #[test]
    fn same_group_duplicates_use_first_note_as_canonical() {
        let mut repo = MemoryCollectionRepository::new();
        add(&mut repo, 5, "A", "谢谢", "[sound:xiexie.mp3]");
        add(&mut repo, 6, "A", "谢谢", "");
        let groups = [group("A")];

        run(&mut repo, &groups, &HashSet::new());
        let duplicate = repo.get_note(6).unwrap();
        assert!(duplicate.has_tag("duplicate-audio::a::5"));
        assert_eq!(duplicate.field("Audio"), Some("[sound:xiexie.mp3]"));
        assert!(repo.cards_of(6)[0].is_flagged_duplicate());

        let canonical = repo.get_note(5).unwrap();
        assert!(canonical.tags().is_empty());
        assert!(!repo.cards_of(5)[0].suspended);
    }

    fn example_group(n: u32) -> GroupSpec {
        GroupSpec {
            name: format!("Example {n}"),
            query: format!("note:Advanced \"example {n}:_*\""),
            tag_prefix: format!("dup::example{n}::"),
            card_name: format!("Listening Example {n}"),
            text_field: format!("Example {n}"),
            audio_field: format!("Example {n} Audio"),
        }
    }

    fn add_advanced(repo: &mut MemoryCollectionRepository, id: i64, first: &str, second: &str) {
        repo.insert_note(Note::new(
            id,
            "Advanced",
            [
                ("Example 1", first),
                ("Example 1 Audio", ""),
                ("Example 2", second),
                ("Example 2 Audio", ""),
            ],
        ));
        repo.add_card(id, 0, "Listening Example 1").unwrap();
        repo.add_card(id, 1, "Listening Example 2").unwrap();
    }

    #[test]
    fn note_in_two_groups_is_its_own_canonical() {
        let mut repo = MemoryCollectionRepository::new();
        add_advanced(&mut repo, 1, "好", "好");
        add_advanced(&mut repo, 2, "好", "");
        let groups = [example_group(1), example_group(2)];

        let first = run(&mut repo, &groups, &HashSet::new());
        assert_eq!(first.tags_added, 1);
        assert_eq!(first.cards_flagged, 1);

        let canonical = repo.get_note(1).unwrap();
        assert!(canonical.tags().is_empty());
        assert!(repo.cards_of(1).iter().all(|card| !card.suspended));

        let duplicate = repo.get_note(2).unwrap();
        assert_eq!(duplicate.tags(), ["dup::example1::1".to_string()]);
        let cards = repo.cards_of(2);
        assert!(cards[0].is_flagged_duplicate());
        assert!(!cards[1].suspended);

        let second = run(&mut repo, &groups, &HashSet::new());
        assert_eq!(second, DedupReport::default());
    }

    #[test]
    fn existing_audio_and_prefix_tags_are_kept() {
        let mut repo = MemoryCollectionRepository::new();
        add(&mut repo, 1, "A", "好", "[sound:mine.mp3]");
        add(&mut repo, 2, "B", "好", "[sound:theirs.mp3]");
        let mut note = repo.get_note(1).unwrap();
        note.add_tag("duplicate-audio::a::999");
        repo.update_note(&note).unwrap();

        let report = run(&mut repo, &[group("A"), group("B")], &HashSet::new());
        assert_eq!(report.tags_added, 0);
        assert_eq!(report.audio_copied, 0);
        assert_eq!(report.cards_flagged, 1);
        let note = repo.get_note(1).unwrap();
        assert_eq!(note.field("Audio"), Some("[sound:mine.mp3]"));
        assert_eq!(note.tags(), ["duplicate-audio::a::999".to_string()]);
    }

    #[test]
    fn conflicted_keys_are_tagged_but_get_no_audio() {
        let mut repo = MemoryCollectionRepository::new();
        add(&mut repo, 1, "A", "再见", "");
        add(&mut repo, 2, "B", "再见", "b.mp3");
        let conflicted = HashSet::from([NormalizedKey::from_example("再见")]);

        let report = run(&mut repo, &[group("A"), group("B")], &conflicted);
        assert_eq!(report.tags_added, 1);
        assert_eq!(report.audio_copied, 0);
        assert_eq!(repo.get_note(1).unwrap().field("Audio"), Some(""));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut repo = MemoryCollectionRepository::new();
        add(&mut repo, 1, "A", "你好", "");
        add(&mut repo, 2, "A", "你好", "");
        add(&mut repo, 3, "B", "你好", "x.mp3");
        add(&mut repo, 4, "B", "你好", "");
        let groups = [group("A"), group("B")];

        let first = run(&mut repo, &groups, &HashSet::new());
        assert!(first.tags_added > 0);
        let second = run(&mut repo, &groups, &HashSet::new());
        assert_eq!(second, DedupReport::default());
    }

    #[test]
    fn card_query_escapes_template_names() {
        assert_eq!(
            duplicate_card_query(42, "Listening_1"),
            "nid:42 \"card:Listening\\_1\" -(is:suspended flag:7)"
        );
    }
}
