// speech/text.rs
//
// Utterance normalization shared by the reconciler and manual entry.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Trim and collapse inner whitespace runs to a single space
pub fn normalize_utterance(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Key used for case-insensitive duplicate detection
pub fn dedup_key(text: &str) -> String {
    normalize_utterance(text).to_lowercase()
}

/// Join result fragments the way engines deliver them (fragments usually carry
/// their own leading space, but not always)
pub fn join_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let joined = fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_utterance(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_utterance() {
        assert_eq!(normalize_utterance("  what   is\tyour  name \n"), "what is your name");
        assert_eq!(normalize_utterance(""), "");
    }

    #[test]
    fn test_dedup_key_is_case_insensitive() {
        assert_eq!(dedup_key("Tell me about Yourself"), dedup_key("tell me  about yourself "));
    }

    #[test]
    fn test_join_fragments() {
        assert_eq!(join_fragments(["what is", " your", "", "name "]), "what is your name");
    }
}
