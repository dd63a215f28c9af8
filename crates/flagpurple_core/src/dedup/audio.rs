//! Collection-wide audio unification pre-pass.
//!
//! For each normalized key, the distinct non-empty audio values across all
//! members (each read through its own group's audio field) decide the action:
//! none is logged, exactly one is copied into every empty member field, more
//! than one is a conflict that is logged and left alone.

use crate::dedup::{required_field, DedupResult, GlobalIndex, NormalizedKey};
use crate::model::group::GroupSpec;
use crate::model::note::NoteId;
use crate::repo::CollectionRepository;
use log::{info, warn};
use std::collections::{BTreeSet, HashSet};

/// Outcome of the audio pre-pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioPrepass {
    /// Keys whose members carry more than one distinct audio value.
    pub conflicted: HashSet<NormalizedKey>,
    pub keys_without_audio: usize,
    /// Audio fields written.
    pub written: usize,
}

/// Fills empty audio fields for keys with exactly one distinct audio value.
///
/// # Errors
/// - `MissingField` when a member note lacks its group's audio field.
/// - `Repo` when a read or write fails; earlier writes stay applied.
pub fn unify_audio<R: CollectionRepository>(
    repo: &mut R,
    groups: &[GroupSpec],
    global: &GlobalIndex,
) -> DedupResult<AudioPrepass> {
    let mut outcome = AudioPrepass::default();

    for (key, members) in global.iter() {
        let mut slots: Vec<(NoteId, &str, String)> = Vec::with_capacity(members.len());
        for member in members {
            let audio_field = groups[member.group].audio_field.as_str();
            let note = repo.get_note(member.note_id)?;
            let audio = required_field(&note, audio_field)?.to_string();
            slots.push((member.note_id, audio_field, audio));
        }

        let distinct = slots
            .iter()
            .map(|(_, _, audio)| audio.as_str())
            .filter(|audio| !audio.is_empty())
            .collect::<BTreeSet<_>>();

        match distinct.len() {
            0 => {
                warn!(
                    "event=audio_missing module=dedup key={:?} notes={}",
                    key.as_str(),
                    slots.len()
                );
                outcome.keys_without_audio += 1;
            }
            1 => {
                let Some(audio) = distinct.first().map(|audio| audio.to_string()) else {
                    continue;
                };
                for (note_id, audio_field, current) in &slots {
                    if *current == audio {
                        continue;
                    }
                    // Re-read: an earlier slot may have written this note.
                    let mut note = repo.get_note(*note_id)?;
                    if required_field(&note, audio_field)? == audio {
                        continue;
                    }
                    note.set_field(audio_field, audio.clone());
                    repo.update_note(&note)?;
                    info!(
                        "event=audio_unified module=dedup note_id={} field={:?} audio={:?}",
                        note_id, audio_field, audio
                    );
                    outcome.written += 1;
                }
            }
            _ => {
                warn!(
                    "event=audio_conflict module=dedup key={:?} audios={:?}",
                    key.as_str(),
                    distinct
                );
                outcome.conflicted.insert(key.clone());
            }
        }
    }

    Ok(outcome)
}
