//! Legacy duplicate-tag repair.
//!
//! Earlier runs wrote duplicate markers as `duplicate-audio__...` or with
//! single-colon separators. Underscore tags are dropped; single-colon tags
//! are rewritten into the `::` hierarchy. Everything else is left alone.

use crate::model::note::tag_matches_or_descends;
use crate::repo::{CollectionRepository, RepoResult};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix of the obsolete underscore-joined scheme.
pub const LEGACY_UNDERSCORE_PREFIX: &str = "duplicate-audio__";

static LEGACY_SINGLE_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^duplicate-audio:[^:]").expect("legacy tag regex must compile"));

/// What the tag normalizer does with one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyTagAction {
    Keep,
    Remove,
    Rename(String),
}

/// Outcome of one tag-normalizer run, counted in distinct tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagFixReport {
    pub removed: usize,
    pub renamed: usize,
}

/// Decides the repair for a single tag.
pub fn classify_legacy_tag(tag: &str) -> LegacyTagAction {
    if tag.starts_with(LEGACY_UNDERSCORE_PREFIX) {
        LegacyTagAction::Remove
    } else if LEGACY_SINGLE_COLON.is_match(tag) {
        LegacyTagAction::Rename(tag.replace(':', "::"))
    } else {
        LegacyTagAction::Keep
    }
}

/// Removes and renames legacy duplicate tags across the whole collection.
///
/// Rename and removal carry `::` children along, so a child of a tag already
/// handled in this run is skipped.
pub fn fix_tags<R: CollectionRepository>(repo: &mut R) -> RepoResult<TagFixReport> {
    let mut report = TagFixReport::default();
    let mut handled: Vec<String> = Vec::new();

    for tag in repo.all_tags()? {
        if handled
            .iter()
            .any(|parent| tag_matches_or_descends(&tag, parent))
        {
            debug!("event=tag_skipped module=tags tag={:?} reason=parent_handled", tag);
            continue;
        }
        match classify_legacy_tag(&tag) {
            LegacyTagAction::Keep => continue,
            LegacyTagAction::Remove => {
                let notes = repo.remove_tag(&tag)?;
                info!(
                    "event=tag_removed module=tags status=ok tag={:?} notes={}",
                    tag, notes
                );
                report.removed += 1;
            }
            LegacyTagAction::Rename(new) => {
                let notes = repo.rename_tag(&tag, &new)?;
                info!(
                    "event=tag_renamed module=tags status=ok old={:?} new={:?} notes={}",
                    tag, new, notes
                );
                report.renamed += 1;
            }
        }
        handled.push(tag);
    }
    Ok(report)
}
