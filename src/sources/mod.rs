//! External collaborators: chat platform, documentation platform, answer generator
//!
//! The pipeline only talks to these traits, so tests swap in in-memory fakes.

pub mod confluence;
pub mod llm;
pub mod slack;

use crate::error::Result;
use crate::search::SanitizedQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use confluence::ConfluenceClient;
pub use llm::LiteLlmClient;
pub use slack::SlackClient;

/// A message fetched from the chat platform
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    pub ts: String,
    pub channel: String,
    pub user: String,
    pub text: String,
}

/// A past message returned by a chat search
#[derive(Debug, Clone, Default)]
pub struct ChatHit {
    pub ts: String,
    pub channel: String,
    /// User id of the author
    pub user: String,
    pub text: String,
}

/// A documentation page returned by a docs search
#[derive(Debug, Clone)]
pub struct DocPage {
    pub id: String,
    pub title: String,
    /// Plain-text excerpt of the page body
    pub content: String,
    pub url: String,
    pub author: String,
    pub updated: Option<DateTime<Utc>>,
}

/// Chat platform operations used by intake, search and delivery
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Fetch a single message by channel and timestamp
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<ChatMessage>;

    /// Search recent messages
    async fn search_messages(&self, query: &str, days_back: u32) -> Result<Vec<ChatHit>>;

    /// Post a top-level message, returning its timestamp
    async fn post_message(&self, channel: &str, text: &str) -> Result<String>;

    /// Post a threaded reply, returning the reply timestamp
    async fn post_thread_reply(&self, channel: &str, thread_ts: &str, text: &str)
        -> Result<String>;

    /// Display name for a user id
    async fn resolve_user(&self, user_id: &str) -> Result<String>;
}

/// Documentation search
#[async_trait]
pub trait DocsPlatform: Send + Sync {
    async fn search_pages(&self, query: &SanitizedQuery) -> Result<Vec<DocPage>>;
}

/// Answer generation from a system and user prompt
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
