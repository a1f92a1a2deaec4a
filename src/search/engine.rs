//! Fan-out search across chat and documentation sources

use super::keywords::extract_keywords;
use super::ranking::{filter_and_rank, score_keywords};
use super::sanitize::sanitize;
use crate::config::Config;
use crate::error::{Result, SleuthError};
use crate::sources::slack::{message_permalink, ts_to_datetime};
use crate::sources::{ChatPlatform, DocsPlatform};
use crate::storage::{Database, ResultSource, SearchResult};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Search tuning taken from configuration
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub similarity_threshold: f64,
    pub max_results: usize,
    pub days_back: u32,
    pub source_timeout: Duration,
    pub workspace_url: String,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            similarity_threshold: config.search.similarity_threshold,
            max_results: config.search.max_results,
            days_back: config.search.days_back,
            source_timeout: Duration::from_secs(config.search.source_timeout_secs),
            workspace_url: config.slack.workspace_url.clone(),
        }
    }
}

/// Searches every source for one inquiry
pub struct SearchEngine {
    chat: Arc<dyn ChatPlatform>,
    docs: Arc<dyn DocsPlatform>,
    db: Arc<Database>,
    settings: SearchSettings,
}

impl SearchEngine {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        docs: Arc<dyn DocsPlatform>,
        db: Arc<Database>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            chat,
            docs,
            db,
            settings,
        }
    }

    /// Search both sources, persist every scored result, return the ranked subset.
    ///
    /// A failing or slow source contributes nothing. Only a persistence failure
    /// is returned as an error.
    pub async fn search_all(&self, query: &str, inquiry_id: i64) -> Result<Vec<SearchResult>> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            tracing::info!(inquiry_id, "No searchable keywords in inquiry");
            return Ok(Vec::new());
        }
        let search_query = keywords.join(" ");

        tracing::info!(
            inquiry_id,
            search_query = %search_query,
            "Starting search across all sources"
        );

        let (chat_results, docs_results) = tokio::join!(
            self.bounded(
                ResultSource::Chat,
                inquiry_id,
                self.search_chat(&search_query, &keywords, inquiry_id)
            ),
            self.bounded(
                ResultSource::Docs,
                inquiry_id,
                self.search_docs(&search_query, &keywords, inquiry_id)
            ),
        );

        let mut all_results = chat_results;
        all_results.extend(docs_results);

        self.db.insert_search_results(&all_results)?;

        let total = all_results.len();
        let ranked = filter_and_rank(
            all_results,
            self.settings.similarity_threshold,
            self.settings.max_results,
        );

        tracing::info!(
            inquiry_id,
            total_results = total,
            filtered_results = ranked.len(),
            "Search completed"
        );

        Ok(ranked)
    }

    /// Apply the per-source deadline; failures degrade to no results
    async fn bounded<F>(&self, source: ResultSource, inquiry_id: i64, search: F) -> Vec<SearchResult>
    where
        F: Future<Output = Result<Vec<SearchResult>>>,
    {
        match tokio::time::timeout(self.settings.source_timeout, search).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                tracing::error!(inquiry_id, source = source.as_str(), error = %e, "Source search failed");
                Vec::new()
            }
            Err(_) => {
                let e = SleuthError::Timeout {
                    operation: "source search",
                    secs: self.settings.source_timeout.as_secs(),
                };
                tracing::error!(inquiry_id, source = source.as_str(), error = %e, "Source search failed");
                Vec::new()
            }
        }
    }

    async fn search_chat(
        &self,
        query: &str,
        keywords: &[String],
        inquiry_id: i64,
    ) -> Result<Vec<SearchResult>> {
        let hits = self
            .chat
            .search_messages(query, self.settings.days_back)
            .await?;

        let mut authors: HashMap<String, String> = HashMap::new();
        let mut results = Vec::with_capacity(hits.len());

        for hit in hits {
            let author = match authors.get(&hit.user) {
                Some(name) => name.clone(),
                None => {
                    let name = match self.chat.resolve_user(&hit.user).await {
                        Ok(name) if !name.is_empty() => name,
                        Ok(_) => hit.user.clone(),
                        Err(e) => {
                            tracing::debug!(user = %hit.user, error = %e, "Could not resolve author");
                            hit.user.clone()
                        }
                    };
                    authors.insert(hit.user.clone(), name.clone());
                    name
                }
            };

            results.push(SearchResult {
                inquiry_id,
                source: ResultSource::Chat,
                url: message_permalink(&self.settings.workspace_url, &hit.channel, &hit.ts),
                score: score_keywords(&hit.text, keywords),
                created_date: ts_to_datetime(&hit.ts).unwrap_or_else(Utc::now),
                source_item_id: hit.ts,
                title: "Slack Message".to_string(),
                content: hit.text,
                author,
            });
        }

        Ok(results)
    }

    async fn search_docs(
        &self,
        query: &str,
        keywords: &[String],
        inquiry_id: i64,
    ) -> Result<Vec<SearchResult>> {
        let pages = self.docs.search_pages(&sanitize(query)).await?;

        Ok(pages
            .into_iter()
            .map(|page| SearchResult {
                inquiry_id,
                source: ResultSource::Docs,
                score: score_keywords(&format!("{} {}", page.title, page.content), keywords),
                source_item_id: page.id,
                title: page.title,
                content: page.content,
                url: page.url,
                author: page.author,
                created_date: page.updated.unwrap_or_else(Utc::now),
            })
            .collect())
    }
}
