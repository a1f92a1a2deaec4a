//! Query sanitization for the documentation search language

use std::fmt;

const MAX_QUERY_CHARS: usize = 100;

const SPECIAL_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', '"', '\'', '\\', '~', '*', '?'];

const OPERATORS: &[&str] = &["and", "or", "not"];

/// A query safe to embed in a CQL text clause.
///
/// Only [`sanitize`] constructs one, so every docs search goes through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedQuery(String);

impl SanitizedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SanitizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip query operators and special characters, collapse whitespace, cap length
pub fn sanitize(query: &str) -> SanitizedQuery {
    let replaced: String = query
        .chars()
        .map(|c| if SPECIAL_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let joined = replaced
        .split_whitespace()
        .filter(|word| !OPERATORS.iter().any(|op| word.eq_ignore_ascii_case(op)))
        .collect::<Vec<_>>()
        .join(" ");

    let truncated = match joined.char_indices().nth(MAX_QUERY_CHARS) {
        Some((idx, _)) => &joined[..idx],
        None => joined.as_str(),
    };

    SanitizedQuery(truncated.trim().to_string())
}
