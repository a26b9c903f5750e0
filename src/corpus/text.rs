// Text helpers shared by indexing and lexical scoring
use ahash::AHashSet;
use regex::Regex;
use std::sync::OnceLock;

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("static regex"))
}

/// Collapse every whitespace run into one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of distinct case-folded words
pub fn unique_word_count(text: &str) -> usize {
    word_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<AHashSet<_>>()
        .len()
}
