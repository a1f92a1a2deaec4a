//! Keyword extraction for literal-overlap scoring

/// Words carrying no search signal
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
    "would", "should", "could", "how", "what", "where", "when", "why", "who",
];

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Extract search keywords from free text.
///
/// Lowercases, splits on whitespace, trims surrounding punctuation, then drops
/// tokens of two characters or fewer and stop words. Order of first appearance
/// is kept and repeats are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for token in text.to_lowercase().split_whitespace() {
        let word = token.trim_matches(TRIM_CHARS);
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }

    keywords
}
