//! Inbound Slack payloads, decoded once at the webhook boundary

use crate::inquiry::ReactionNotice;
use crate::storage::ReactionEventType;
use serde::Deserialize;
use std::collections::HashMap;

/// Outer Events API envelope
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification { challenge: String },
    EventCallback { event: SlackEvent },
    #[serde(other)]
    Unknown,
}

/// Inner event of an `event_callback`
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    ReactionAdded(ReactionPayload),
    ReactionRemoved(ReactionPayload),
    Message,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ReactionPayload {
    /// User who reacted
    pub user: String,
    pub reaction: String,
    pub item: ReactionItem,
    #[serde(default)]
    pub event_ts: String,
}

/// What the reaction was attached to
#[derive(Debug, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

impl ReactionPayload {
    /// Reactions on anything but messages (files, file comments) are dropped
    pub fn into_notice(self, event_type: ReactionEventType) -> Option<ReactionNotice> {
        if self.item.kind != "message" {
            return None;
        }

        Some(ReactionNotice {
            message_id: self.item.ts,
            channel_id: self.item.channel,
            user_id: self.user,
            reaction: self.reaction,
            event_type,
            event_ts: self.event_ts,
        })
    }
}

/// Slash command invocation (form-encoded)
#[derive(Debug, Clone, Default)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

impl SlashCommand {
    /// Decode an `application/x-www-form-urlencoded` body
    pub fn from_form(body: &[u8]) -> Option<Self> {
        let body = std::str::from_utf8(body).ok()?;
        let mut fields = parse_form(body);

        let command = fields.remove("command")?;
        Some(Self {
            command,
            text: fields.remove("text").unwrap_or_default(),
            user_id: fields.remove("user_id").unwrap_or_default(),
            channel_id: fields.remove("channel_id").unwrap_or_default(),
        })
    }
}

fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}
