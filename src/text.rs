//! Free-text cleaning helpers for post and review bodies.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Characters counted by [`is_spam`] as suspicious punctuation.
pub const SPAM_SYMBOLS: &str = "!@#$%^&*()";
pub const SPAM_MIN_CLEAN_LEN: usize = 5;
pub const SPAM_MAX_SYMBOLS: usize = 5;

pub const ENGLISH_STOPWORDS: [&str; 179] = [
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static HTML tag pattern"))
}

fn non_text_or_hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s#]").expect("static symbol pattern"))
}

fn non_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("static symbol pattern"))
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\w+").expect("static hashtag pattern"))
}

pub fn english_stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ENGLISH_STOPWORDS.iter().copied().collect())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips HTML tags and symbols other than `#`, collapses whitespace, lowercases.
pub fn clean_text(text: &str) -> String {
    let without_tags = html_tag_re().replace_all(text, "");
    let without_symbols = non_text_or_hash_re().replace_all(&without_tags, "");
    collapse_whitespace(&without_symbols).to_lowercase()
}

/// Like [`clean_text`] but `#` is dropped too.
pub fn standardize_text(text: &str) -> String {
    let without_tags = html_tag_re().replace_all(text, "");
    let without_symbols = non_text_re().replace_all(&without_tags, "");
    collapse_whitespace(&without_symbols).to_lowercase()
}

/// `#word` tokens in order of appearance, space separated.
pub fn extract_hashtags(text: &str) -> String {
    hashtag_re()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn remove_stopwords(text: &str, stopwords: &HashSet<&str>) -> String {
    text.split_whitespace()
        .filter(|word| !stopwords.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spam when the cleaned text is present but too short, or the original text
/// carries too many of [`SPAM_SYMBOLS`].
pub fn is_spam(cleaned: Option<&str>, original: Option<&str>) -> bool {
    if cleaned.is_some_and(|text| text.chars().count() < SPAM_MIN_CLEAN_LEN) {
        return true;
    }
    let symbols = original
        .unwrap_or_default()
        .chars()
        .filter(|c| SPAM_SYMBOLS.contains(*c))
        .count();
    symbols > SPAM_MAX_SYMBOLS
}
