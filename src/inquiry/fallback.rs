//! Locally synthesized reply used when answer generation fails

use crate::storage::SearchResult;

pub const NO_RESULTS_FALLBACK: &str = "I couldn't find relevant information to answer your inquiry. You might want to check our documentation or reach out to the relevant team directly.";

const MAX_FALLBACK_ITEMS: usize = 3;
const EXCERPT_CHARS: usize = 100;

/// Bulleted summary of the top results, or the fixed no-results message
pub fn fallback_response(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS_FALLBACK.to_string();
    }

    let mut response = String::from("I found some potentially relevant information:\n\n");

    for result in results.iter().take(MAX_FALLBACK_ITEMS) {
        response.push_str(&format!("• **{}** ({})\n", result.title, result.source.label()));
        if !result.content.is_empty() {
            response.push_str(&format!("  {}\n", result.excerpt(EXCERPT_CHARS)));
        }
        if !result.url.is_empty() {
            response.push_str(&format!("  {}\n", result.url));
        }
        response.push('\n');
    }

    response.push_str(
        "Please review these resources or contact the relevant team for more specific assistance.",
    );
    response
}
