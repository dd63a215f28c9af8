//! Duplicate-group configuration.
//!
//! # Responsibility
//! - Provide the built-in priority-ordered group table.
//! - Load and validate a replacement table from TOML.
//!
//! # Invariants
//! - A validated table has at least one group, unique group names and no
//!   blank values.
//! - File order is priority order: later groups are more canonical.

use crate::model::group::GroupSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading a group table.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not a valid TOML group table.
    Parse(toml::de::Error),
    /// The table parsed but violates a table invariant.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read group table `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid group table: {err}"),
            Self::Invalid(message) => write!(f, "invalid group table: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupTable {
    #[serde(default)]
    group: Vec<GroupSpec>,
}

fn spec(
    name: &str,
    query: &str,
    tag_prefix: &str,
    card_name: &str,
    text_field: &str,
    audio_field: &str,
) -> GroupSpec {
    GroupSpec {
        name: name.to_string(),
        query: query.to_string(),
        tag_prefix: tag_prefix.to_string(),
        card_name: card_name.to_string(),
        text_field: text_field.to_string(),
        audio_field: audio_field.to_string(),
    }
}

/// Built-in group table, lowest priority first.
pub fn default_group_specs() -> Vec<GroupSpec> {
    let mut groups = (1..=3)
        .map(|n| {
            spec(
                &format!("Example {n}"),
                &format!("\"note:Chinese (advanced)\\_\" \"example {n}:_*\""),
                &format!("duplicate-audio::example{n}::"),
                &format!("Listening Example {n}"),
                &format!("Example {n}"),
                &format!("Example {n} Audio"),
            )
        })
        .collect::<Vec<_>>();
    groups.push(spec(
        "中文",
        "\"note:Chinese Grammar Wiki\" 中文:_*",
        "duplicate-audio::chinese-grammar-wiki::",
        "Listening Translation",
        "中文",
        "中文 audio",
    ));
    groups.push(spec(
        "Hanzi",
        "note:SpoonFedNote Hanzi:_*",
        "duplicate-audio::spoon-fed-chinese::",
        "Listening",
        "Hanzi",
        "Audio",
    ));
    groups
}

/// Parses and validates a TOML group table (`[[group]]` entries).
pub fn parse_group_specs(source: &str) -> ConfigResult<Vec<GroupSpec>> {
    let table: GroupTable = toml::from_str(source)?;
    validate_group_specs(&table.group)?;
    Ok(table.group)
}

/// Reads a TOML group table from `path`.
///
/// # Errors
/// - `Io` when the file cannot be read.
/// - `Parse`/`Invalid` when the content is not a valid table.
pub fn load_group_specs(path: impl AsRef<Path>) -> ConfigResult<Vec<GroupSpec>> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_group_specs(&source)
}

/// Checks table invariants.
pub fn validate_group_specs(groups: &[GroupSpec]) -> ConfigResult<()> {
    if groups.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one group is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for group in groups {
        let values = [
            ("name", &group.name),
            ("query", &group.query),
            ("tag_prefix", &group.tag_prefix),
            ("card_name", &group.card_name),
            ("text_field", &group.text_field),
            ("audio_field", &group.audio_field),
        ];
        for (key, value) in values {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "group `{}` has a blank `{key}`",
                    group.name
                )));
            }
        }
        if !names.insert(group.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate group name `{}`",
                group.name
            )));
        }
    }
    Ok(())
}
