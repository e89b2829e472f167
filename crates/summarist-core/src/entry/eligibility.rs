use scraper::Html;

use super::models::Entry;
use crate::config::BatchConfig;

/// Reading speed used for the estimate, in words per minute
const WORDS_PER_MINUTE: f64 = 300.0;

/// Count words in entry HTML.
///
/// CJK characters count as one word each; everything else is split on
/// whitespace.
pub fn word_count(html: &str) -> usize {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");

    let mut cjk = 0;
    let mut rest = String::with_capacity(text.len());
    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
            rest.push(' ');
        } else {
            rest.push(c);
        }
    }

    cjk + rest.split_whitespace().count()
}

/// Estimated reading time in whole minutes
pub fn reading_time_minutes(html: &str) -> u32 {
    (word_count(html) as f64 / WORDS_PER_MINUTE).round() as u32
}

/// Whether an entry may be summarized by a batch run
pub fn is_eligible(entry: &Entry, config: &BatchConfig) -> bool {
    if !config.feeds.iter().any(|feed| feed == &entry.feed) {
        return false;
    }

    reading_time_minutes(&entry.content) >= config.min_reading_time_mins
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'     // Hiragana, Katakana
        | '\u{3400}'..='\u{4DBF}'   // CJK Extension A
        | '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
        | '\u{AC00}'..='\u{D7AF}'   // Hangul syllables
        | '\u{F900}'..='\u{FAFF}'   // CJK Compatibility Ideographs
    )
}
