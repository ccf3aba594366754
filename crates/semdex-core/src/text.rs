//! Text normalisation, tokenisation and hashing helpers.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::MatchInfo;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("static regex"));

/// The NLTK English stop-word list.
pub const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've", "you'll", "you'd",
    "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she", "she's", "her", "hers",
    "herself", "it", "it's", "its", "itself", "they", "them", "their", "theirs", "themselves", "what",
    "which", "who", "whom", "this", "that", "that'll", "these", "those", "am", "is", "are", "was", "were",
    "be", "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for", "with", "about",
    "against", "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once", "here",
    "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
    "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain",
    "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn",
    "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn",
    "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Lowercase, replace simple HTML tags with spaces, collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let untagged = TAG_RE.replace_all(&lowered, " ");
    SPACE_RE.replace_all(&untagged, " ").trim().to_string()
}

/// Lowercase word tokens with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Hex BLAKE3 digest of the text's UTF-8 bytes.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// First `max_chars` characters, with `...` appended when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Query/document token overlap; at most 10 matched tokens are reported.
pub fn match_info(query: &str, doc_text: &str) -> MatchInfo {
    let query_tokens: BTreeSet<String> = tokenize(query).into_iter().collect();
    if query_tokens.is_empty() {
        return MatchInfo::default();
    }
    let doc_tokens: BTreeSet<String> = tokenize(doc_text).into_iter().collect();
    let overlap: Vec<String> = query_tokens.intersection(&doc_tokens).cloned().collect();
    let ratio = overlap.len() as f32 / query_tokens.len() as f32;
    MatchInfo {
        token_overlap: overlap.len(),
        overlap_ratio: (ratio * 1000.0).round() / 1000.0,
        matched_tokens: overlap.into_iter().take(10).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_whitespace() {
        assert_eq!(clean_text("  <p>Hello</p>\n\n  <b>World</b>\t!"), "hello world !");
    }

    #[test]
    fn tokenize_drops_stop_words() {
        assert_eq!(tokenize("The cats are on the mat"), vec!["cats", "mat"]);
    }

    #[test]
    fn contraction_fragments_are_stop_words() {
        assert_eq!(tokenize("They don't mind themselves, shouldn't we?"), vec!["mind"]);
        assert_eq!(STOP_WORDS.len(), 179);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 200), "short");
    }

    #[test]
    fn match_info_counts_overlap() {
        let info = match_info("feline cats mammals", "cats are mammals");
        assert_eq!(info.token_overlap, 2);
        assert_eq!(info.overlap_ratio, 0.667);
        assert_eq!(info.matched_tokens, vec!["cats", "mammals"]);
        assert_eq!(match_info("the a", "anything"), MatchInfo::default());
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }
}
