//! Wildcard patterns used by search terms.
//!
//! `*` matches any run of characters, `_` exactly one. A backslash makes the
//! following character literal (`\_`, `\*`, `\\`).

use crate::search::{SearchError, SearchResult};
use regex::Regex;

/// Compiled, anchored, case-insensitive wildcard pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    regex: Regex,
}

impl Glob {
    /// Compiles `pattern`. `query` is only used for error reporting.
    pub fn parse(pattern: &str, query: &str) -> SearchResult<Self> {
        let mut expr = String::from("(?is)^");
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped) => expr.push_str(&regex::escape(&escaped.to_string())),
                    None => expr.push_str(r"\\"),
                },
                '*' => expr.push_str(".*"),
                '_' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|err| SearchError::invalid(query, format!("bad pattern `{pattern}`: {err}")))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns whether `value` matches the whole pattern.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Glob {}
