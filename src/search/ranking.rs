//! Keyword-overlap scoring and result ranking

use super::keywords::extract_keywords;
use crate::storage::SearchResult;

/// Fraction of query keywords found in `content`, case-insensitively.
///
/// Each keyword counts once regardless of how often it appears. Returns 0.0
/// when the query yields no keywords.
pub fn calculate_score(content: &str, query: &str) -> f64 {
    score_keywords(content, &extract_keywords(query))
}

/// Score `content` against pre-extracted lowercase keywords
pub fn score_keywords(content: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }

    let content = content.to_lowercase();
    let matched = keywords
        .iter()
        .filter(|k| content.contains(k.as_str()))
        .count();

    matched as f64 / keywords.len() as f64
}

/// Drop results below `threshold`, order by score descending, keep the top `max_results`.
///
/// The sort is stable, so equal scores keep discovery order.
pub fn filter_and_rank(
    results: Vec<SearchResult>,
    threshold: f64,
    max_results: usize,
) -> Vec<SearchResult> {
    let mut ranked: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| r.score >= threshold)
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(max_results);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ResultSource;
    use chrono::Utc;

    fn scored(title: &str, score: f64) -> SearchResult {
        SearchResult {
            inquiry_id: 1,
            source: ResultSource::Docs,
            source_item_id: title.to_string(),
            title: title.to_string(),
            content: String::new(),
            url: String::new(),
            score,
            author: String::new(),
            created_date: Utc::now(),
        }
    }

    #[test]
    fn test_full_match_scores_one() {
        let score = calculate_score("deploy the service to production", "How to deploy service");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_disjoint_scores_zero() {
        assert_eq!(calculate_score("lunch menu for friday", "How to deploy service"), 0.0);
    }

    #[test]
    fn test_partial_and_case_insensitive() {
        assert_eq!(calculate_score("DEPLOY notes", "deploy service"), 0.5);
    }

    #[test]
    fn test_empty_query_scores_zero() {
        assert_eq!(calculate_score("anything at all", "how is it"), 0.0);
        assert_eq!(calculate_score("anything", ""), 0.0);
    }

    #[test]
    fn test_score_bounded_with_repeats() {
        let score = calculate_score("deploy deploy deploy", "deploy deploy");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_filter_and_rank() {
        let results = vec![
            scored("low", 0.5),
            scored("first-high", 1.0),
            scored("mid", 0.75),
            scored("second-high", 1.0),
            scored("edge", 0.7),
        ];

        let ranked = filter_and_rank(results, 0.7, 3);
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["first-high", "second-high", "mid"]);
    }

    #[test]
    fn test_rank_keeps_everything_under_limits() {
        let ranked = filter_and_rank(vec![scored("a", 0.9), scored("b", 0.95)], 0.0, 10);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score >= ranked[1].score);
    }
}
