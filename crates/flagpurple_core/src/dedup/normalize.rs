//! Example-text normalization into dedup keys.
//!
//! Rules run in fixed order, each on the previous output:
//! 1. truncate at the first double line break (`<br><br>`, `<br/>`, `<br />`);
//! 2. unwrap `<span class="toneN">` wrappers;
//! 3. replace `<ruby>base<rt>guide</rt></ruby>` with `base`.
//!
//! No case folding or whitespace trimming.

use once_cell::sync::Lazy;
use regex::Regex;

static DOUBLE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<br\s*/?><br\s*/?>").expect("valid double break regex"));
static TONE_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="tone\d">(.*?)</span>"#).expect("valid tone span regex")
});
static RUBY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ruby>(.*?)<rt>.*?</rt></ruby>").expect("valid ruby regex"));

/// Reduces an HTML example sentence to its comparison key.
pub fn normalize_example(text: &str) -> String {
    let sentence = match DOUBLE_BREAK_RE.find(text) {
        Some(marker) => &text[..marker.start()],
        None => text,
    };
    let without_tones = TONE_SPAN_RE.replace_all(sentence, "${1}");
    RUBY_RE.replace_all(&without_tones, "${1}").into_owned()
}
