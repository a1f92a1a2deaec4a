//! Multi-source search and ranking
//!
//! Queries are reduced to keywords, sent to the chat and documentation sources,
//! scored by literal keyword overlap, persisted, then filtered and ranked.

pub mod engine;
pub mod keywords;
pub mod ranking;
pub mod sanitize;

pub use engine::{SearchEngine, SearchSettings};
pub use keywords::extract_keywords;
pub use ranking::{calculate_score, filter_and_rank, score_keywords};
pub use sanitize::{sanitize, SanitizedQuery};
