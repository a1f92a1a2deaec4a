//! Slack Web API client

use super::{ChatHit, ChatMessage, ChatPlatform};
use crate::config::SlackConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SERVICE: &str = "slack";

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    ts: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    messages: SearchMessages,
}

#[derive(Deserialize)]
struct SearchMessages {
    #[serde(default)]
    matches: Vec<SearchMatch>,
}

#[derive(Deserialize)]
struct SearchMatch {
    ts: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    channel: Option<MatchChannel>,
}

#[derive(Deserialize)]
struct MatchChannel {
    id: String,
}

#[derive(Deserialize)]
struct PostResponse {
    ts: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: UserInfo,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: String,
}

/// Slack bot client over the Web API
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    channel_id: String,
    search_count: usize,
    token: Option<String>,
}

impl SlackClient {
    pub fn new(config: &SlackConfig, search_count: usize, token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            channel_id: config.channel_id.clone(),
            search_count,
            token,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            ServiceError::new(
                SERVICE,
                ServiceErrorKind::NotConfigured,
                "missing Slack bot token",
            )
            .into()
        })
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let request = self
            .http
            .get(format!("{}/{}", self.api_base, method))
            .bearer_auth(self.token()?)
            .query(query);
        self.send(method, request).await
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let request = self
            .http
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(self.token()?)
            .json(body);
        self.send(method, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::new(
                SERVICE,
                ServiceErrorKind::from_status(status.as_u16()),
                format!("{} returned HTTP {}", method, status),
            )
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        // Slack reports API failures as HTTP 200 with ok=false
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(ServiceError::new(
                SERVICE,
                api_error_kind(code),
                format!("{}: {}", method, code),
            )
            .into());
        }

        serde_json::from_value(body).map_err(|e| {
            ServiceError::new(SERVICE, ServiceErrorKind::Decode, format!("{}: {}", method, e))
                .into()
        })
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<ChatMessage> {
        let history: HistoryResponse = self
            .get(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("latest", ts.to_string()),
                    ("limit", "1".to_string()),
                    ("inclusive", "true".to_string()),
                ],
            )
            .await?;

        let message = history.messages.into_iter().next().ok_or_else(|| {
            ServiceError::new(
                SERVICE,
                ServiceErrorKind::BadRequest,
                format!("message {} not found in {}", ts, channel),
            )
        })?;

        Ok(ChatMessage {
            ts: message.ts,
            channel: channel.to_string(),
            user: message.user,
            text: message.text,
        })
    }

    async fn search_messages(&self, query: &str, days_back: u32) -> Result<Vec<ChatHit>> {
        let after = (Utc::now() - chrono::Duration::days(i64::from(days_back))).format("%Y-%m-%d");
        let search_query = if self.channel_id.is_empty() {
            format!("{} after:{}", query, after)
        } else {
            format!("{} in:{} after:{}", query, self.channel_id, after)
        };

        let response: SearchResponse = self
            .get(
                "search.messages",
                &[
                    ("query", search_query),
                    ("count", self.search_count.to_string()),
                    ("sort", "timestamp".to_string()),
                ],
            )
            .await?;

        Ok(response
            .messages
            .matches
            .into_iter()
            .map(|m| ChatHit {
                ts: m.ts,
                channel: m.channel.map(|c| c.id).unwrap_or_default(),
                user: m.user,
                text: m.text,
            })
            .collect())
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<String> {
        let posted: PostResponse = self
            .post("chat.postMessage", &json!({ "channel": channel, "text": text }))
            .await?;
        Ok(posted.ts)
    }

    async fn post_thread_reply(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<String> {
        let posted: PostResponse = self
            .post(
                "chat.postMessage",
                &json!({ "channel": channel, "text": text, "thread_ts": thread_ts }),
            )
            .await?;
        Ok(posted.ts)
    }

    async fn resolve_user(&self, user_id: &str) -> Result<String> {
        let info: UserInfoResponse = self
            .get("users.info", &[("user", user_id.to_string())])
            .await?;

        let name = if info.user.real_name.is_empty() {
            info.user.name
        } else {
            info.user.real_name
        };
        Ok(name)
    }
}

/// Categorize a Slack `error` code
fn api_error_kind(code: &str) -> ServiceErrorKind {
    match code {
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" | "missing_scope" => {
            ServiceErrorKind::Auth
        }
        "ratelimited" => ServiceErrorKind::RateLimit,
        "internal_error" | "fatal_error" | "service_unavailable" => ServiceErrorKind::Server,
        _ => ServiceErrorKind::BadRequest,
    }
}

/// Permalink to a message: `<workspace>/archives/<channel>/p<ts without dot>`
pub fn message_permalink(workspace_url: &str, channel: &str, ts: &str) -> String {
    format!(
        "{}/archives/{}/p{}",
        workspace_url.trim_end_matches('/'),
        channel,
        ts.replace('.', "")
    )
}

/// Convert a Slack `ts` ("1234567890.123456") to a UTC datetime
pub fn ts_to_datetime(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = match ts.split_once('.') {
        Some((secs, micros)) => (secs, micros.parse::<u32>().unwrap_or(0)),
        None => (ts, 0),
    };
    let secs = secs.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, micros.saturating_mul(1000))
}
