use regex::Regex;
use std::sync::OnceLock;

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+(?:['’]\w+)*|[^\w\s]").expect("static regex"))
}

/// Splits a sentence into words and single punctuation marks.
pub fn tokenize(text: &str) -> Vec<&str> {
    word_regex().find_iter(text).map(|m| m.as_str()).collect()
}
