//! OpenAI-compatible chat completions client (LiteLLM proxy)

use super::AnswerGenerator;
use crate::config::LlmConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "llm";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: String,
}

/// Answer generator backed by a LiteLLM `/chat/completions` endpoint
pub struct LiteLlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl LiteLlmClient {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        }
    }
}

#[async_trait]
impl AnswerGenerator for LiteLlmClient {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref().filter(|_| !self.base_url.is_empty()) else {
            return Err(ServiceError::new(
                SERVICE,
                ServiceErrorKind::NotConfigured,
                "LiteLLM not configured",
            )
            .into());
        };

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("x-litellm-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            // The body may echo request details, only the status is logged
            tracing::error!(status = status.as_u16(), "LiteLLM API returned non-success status");
            return Err(ServiceError::new(
                SERVICE,
                ServiceErrorKind::from_status(status.as_u16()),
                format!("chat completion returned HTTP {}", status),
            )
            .into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ServiceError::new(SERVICE, ServiceErrorKind::Decode, "no response generated").into()
            })
    }
}
