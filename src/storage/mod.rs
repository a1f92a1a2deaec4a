//! Storage layer for Sleuth
//!
//! SQLite-backed persistence for inquiries, their search results, and reaction events

pub mod database;
pub mod models;

pub use database::{Database, DbPool, DbStats};
pub use models::{
    Inquiry, InquiryStatus, NewInquiry, NewReactionEvent, ReactionEvent, ReactionEventType,
    ResultSource, SearchResult,
};
