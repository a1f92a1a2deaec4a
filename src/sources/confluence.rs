//! Confluence REST client for documentation search

use super::{DocPage, DocsPlatform};
use crate::config::ConfluenceConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind, SleuthError};
use crate::search::SanitizedQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "confluence";

/// Longest page excerpt kept per result, in characters
const MAX_EXCERPT_CHARS: usize = 500;

#[derive(Deserialize)]
struct ContentSearch {
    #[serde(default)]
    results: Vec<ContentItem>,
}

#[derive(Deserialize)]
struct ContentItem {
    id: String,
    #[serde(default)]
    title: String,
    body: Option<ContentBody>,
    version: Option<ContentVersion>,
}

#[derive(Deserialize)]
struct ContentBody {
    storage: Option<StorageValue>,
}

#[derive(Deserialize)]
struct StorageValue {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct ContentVersion {
    by: Option<VersionAuthor>,
    when: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionAuthor {
    #[serde(default)]
    display_name: String,
}

/// Confluence client scoped to one space
pub struct ConfluenceClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    space_key: String,
    limit: usize,
    api_token: Option<String>,
    tag_pattern: Regex,
}

impl ConfluenceClient {
    pub fn new(config: &ConfluenceConfig, limit: usize, api_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let tag_pattern = Regex::new(r"<[^>]*>").map_err(|e| SleuthError::Other(e.into()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            space_key: config.space_key.clone(),
            limit,
            api_token,
            tag_pattern,
        })
    }

    fn page_url(&self, id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={}", self.base_url, id)
    }

    /// Reduce storage-format markup to a short plain-text excerpt
    fn extract_text(&self, storage: &str) -> String {
        let stripped = self.tag_pattern.replace_all(storage, " ");
        let decoded = decode_entities(&stripped);
        let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

        match collapsed.char_indices().nth(MAX_EXCERPT_CHARS) {
            Some((idx, _)) => format!("{}...", &collapsed[..idx]),
            None => collapsed,
        }
    }
}

#[async_trait]
impl DocsPlatform for ConfluenceClient {
    async fn search_pages(&self, query: &SanitizedQuery) -> Result<Vec<DocPage>> {
        let Some(token) = self.api_token.as_deref().filter(|_| !self.base_url.is_empty()) else {
            tracing::warn!("Confluence is not configured, skipping documentation search");
            return Ok(Vec::new());
        };

        if query.is_empty() {
            return Ok(Vec::new());
        }

        let cql = format!("space={} AND text ~ \"{}\"", self.space_key, query);
        let limit = self.limit.to_string();

        let response = self
            .http
            .get(format!("{}/rest/api/content/search", self.base_url))
            .basic_auth(&self.username, Some(token))
            .header("Accept", "application/json")
            .query(&[
                ("cql", cql.as_str()),
                ("limit", limit.as_str()),
                ("expand", "body.storage,version"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Confluence API error");
            return Err(ServiceError::new(
                SERVICE,
                ServiceErrorKind::from_status(status.as_u16()),
                format!("content search returned HTTP {}", status),
            )
            .into());
        }

        let search: ContentSearch = response
            .json()
            .await
            .map_err(|e| ServiceError::transport(SERVICE, e))?;

        Ok(search
            .results
            .into_iter()
            .map(|item| {
                let body = item
                    .body
                    .and_then(|b| b.storage)
                    .map(|s| s.value)
                    .unwrap_or_default();
                let (author, updated) = match item.version {
                    Some(v) => (
                        v.by.map(|a| a.display_name).unwrap_or_default(),
                        v.when
                            .and_then(|w| DateTime::parse_from_rfc3339(&w).ok())
                            .map(|d| d.with_timezone(&Utc)),
                    ),
                    None => (String::new(), None),
                };

                DocPage {
                    url: self.page_url(&item.id),
                    content: self.extract_text(&body),
                    id: item.id,
                    title: item.title,
                    author,
                    updated,
                }
            })
            .collect())
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
