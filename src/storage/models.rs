//! Persisted records: inquiries, their search results, and reaction audit events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::Pending => "pending",
            InquiryStatus::Processing => "processing",
            InquiryStatus::Completed => "completed",
            InquiryStatus::Failed => "failed",
        }
    }

    /// Completed and failed inquiries are never mutated again
    pub fn is_terminal(&self) -> bool {
        matches!(self, InquiryStatus::Completed | InquiryStatus::Failed)
    }
}

impl fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InquiryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InquiryStatus::Pending),
            "processing" => Ok(InquiryStatus::Processing),
            "completed" => Ok(InquiryStatus::Completed),
            "failed" => Ok(InquiryStatus::Failed),
            other => Err(format!("unknown inquiry status: {}", other)),
        }
    }
}

/// One end-to-end processing attempt for a triggering message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub id: i64,
    /// Slack `ts` of the triggering message, unique across inquiries
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub message_text: String,
    pub source_timestamp: String,
    pub status: InquiryStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub response_sent: bool,
    pub response_text: String,
    pub reply_thread_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_results: Vec<SearchResult>,
}

/// Fields needed to open a new inquiry
#[derive(Debug, Clone)]
pub struct NewInquiry {
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub message_text: String,
    pub source_timestamp: String,
}

/// Evidence provider a search result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Chat,
    Docs,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Chat => "chat",
            ResultSource::Docs => "docs",
        }
    }

    /// Name shown to people reading a reply
    pub fn label(&self) -> &'static str {
        match self {
            ResultSource::Chat => "Slack",
            ResultSource::Docs => "Confluence",
        }
    }
}

impl FromStr for ResultSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ResultSource::Chat),
            "docs" => Ok(ResultSource::Docs),
            other => Err(format!("unknown result source: {}", other)),
        }
    }
}

/// A scored candidate evidence item for one inquiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub inquiry_id: i64,
    pub source: ResultSource,
    pub source_item_id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    /// Keyword overlap score (0.0 to 1.0)
    pub score: f64,
    pub author: String,
    pub created_date: DateTime<Utc>,
}

impl SearchResult {
    /// Content excerpt of at most `max_chars` characters, with an ellipsis when cut
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.content[..idx]),
            None => self.content.clone(),
        }
    }
}

/// Whether a reaction was added to or removed from a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionEventType {
    Added,
    Removed,
}

impl ReactionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionEventType::Added => "added",
            ReactionEventType::Removed => "removed",
        }
    }
}

impl FromStr for ReactionEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(ReactionEventType::Added),
            "removed" => Ok(ReactionEventType::Removed),
            other => Err(format!("unknown reaction event type: {}", other)),
        }
    }
}

/// Audit record of an observed trigger-emoji reaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub id: i64,
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub reaction: String,
    pub event_type: ReactionEventType,
    pub source_timestamp: String,
    pub processed: bool,
    pub inquiry_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to record a reaction event
#[derive(Debug, Clone)]
pub struct NewReactionEvent {
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub reaction: String,
    pub event_type: ReactionEventType,
    pub source_timestamp: String,
}
