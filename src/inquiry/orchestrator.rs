//! Inquiry state machine: `pending -> processing -> completed | failed`

use super::fallback::fallback_response;
use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::config::Config;
use crate::error::{Result, SleuthError};
use crate::search::SearchEngine;
use crate::sources::{AnswerGenerator, ChatPlatform};
use crate::storage::{Database, Inquiry, InquiryStatus, NewInquiry};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of every threaded reply
pub const REPLY_HEADER: &str = "🤖 *AI Assistant Response*\n\n";

/// Time limits for the external steps of one inquiry
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub generation: Duration,
    pub reply: Duration,
}

impl Deadlines {
    pub fn from_config(config: &Config) -> Self {
        Self {
            generation: Duration::from_secs(config.llm.timeout_secs),
            reply: Duration::from_secs(config.pipeline.reply_timeout_secs),
        }
    }
}

/// Drives one inquiry from creation to a terminal state
pub struct InquiryOrchestrator {
    db: Arc<Database>,
    search: SearchEngine,
    chat: Arc<dyn ChatPlatform>,
    generator: Arc<dyn AnswerGenerator>,
    deadlines: Deadlines,
}

impl InquiryOrchestrator {
    pub fn new(
        db: Arc<Database>,
        search: SearchEngine,
        chat: Arc<dyn ChatPlatform>,
        generator: Arc<dyn AnswerGenerator>,
        deadlines: Deadlines,
    ) -> Self {
        Self {
            db,
            search,
            chat,
            generator,
            deadlines,
        }
    }

    /// Run the full pipeline for a new message.
    ///
    /// Returns the inquiry in its final state. Errors are returned when the
    /// `pending` row cannot be created (including [`SleuthError::DuplicateInquiry`])
    /// and when search fails; in the latter case the inquiry is already `failed`.
    pub async fn process(&self, new: NewInquiry) -> Result<Inquiry> {
        tracing::info!(
            message_id = %new.message_id,
            channel_id = %new.channel_id,
            user_id = %new.user_id,
            "Starting inquiry processing"
        );

        let mut inquiry = self.db.create_inquiry(&new)?;

        inquiry.status = InquiryStatus::Processing;
        self.persist(&inquiry);

        let searched = self.search.search_all(&inquiry.message_text, inquiry.id).await;
        let results = match searched {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(inquiry_id = inquiry.id, error = %e, "Search failed");
                inquiry.status = InquiryStatus::Failed;
                self.persist(&inquiry);
                return Err(e);
            }
        };

        let user_prompt = build_user_prompt(&inquiry.message_text, &results);
        let generated = match tokio::time::timeout(
            self.deadlines.generation,
            self.generator.generate(SYSTEM_PROMPT, &user_prompt),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SleuthError::Timeout {
                operation: "answer generation",
                secs: self.deadlines.generation.as_secs(),
            }),
        };

        match generated {
            Ok(answer) => {
                let delivered = self.deliver(&inquiry, &answer).await;
                match delivered {
                    Ok(reply_ts) => {
                        inquiry.status = InquiryStatus::Completed;
                        inquiry.processed_at = Some(Utc::now());
                        inquiry.response_sent = true;
                        inquiry.reply_thread_id = reply_ts;
                        inquiry.response_text = answer;

                        tracing::info!(
                            inquiry_id = inquiry.id,
                            search_results = results.len(),
                            response_length = inquiry.response_text.len(),
                            "Inquiry processing completed successfully"
                        );
                    }
                    Err(e) => {
                        tracing::error!(inquiry_id = inquiry.id, error = %e, "Failed to deliver response");
                        inquiry.status = InquiryStatus::Failed;
                        inquiry.response_text = answer;
                    }
                }
            }
            Err(e) => {
                tracing::error!(
                    inquiry_id = inquiry.id,
                    error = %e,
                    "Answer generation failed, sending fallback"
                );
                let fallback = fallback_response(&results);

                let delivered = self.deliver(&inquiry, &fallback).await;
                match delivered {
                    Ok(reply_ts) => {
                        inquiry.response_sent = true;
                        inquiry.reply_thread_id = reply_ts;
                    }
                    Err(e) => {
                        tracing::error!(
                            inquiry_id = inquiry.id,
                            error = %e,
                            "Failed to deliver fallback response"
                        );
                    }
                }

                inquiry.status = InquiryStatus::Failed;
                inquiry.response_text = fallback;
            }
        }

        self.persist(&inquiry);
        Ok(inquiry)
    }

    /// Post a header-prefixed threaded reply under the original message
    async fn deliver(&self, inquiry: &Inquiry, text: &str) -> Result<String> {
        let formatted = format!("{}{}", REPLY_HEADER, text);

        match tokio::time::timeout(
            self.deadlines.reply,
            self.chat
                .post_thread_reply(&inquiry.channel_id, &inquiry.source_timestamp, &formatted),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SleuthError::Timeout {
                operation: "reply delivery",
                secs: self.deadlines.reply.as_secs(),
            }),
        }
    }

    /// Status updates after creation are logged on failure, never propagated
    fn persist(&self, inquiry: &Inquiry) {
        match self.db.save_inquiry(inquiry) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                inquiry_id = inquiry.id,
                status = %inquiry.status,
                "Inquiry already terminal, update skipped"
            ),
            Err(e) => tracing::error!(
                inquiry_id = inquiry.id,
                status = %inquiry.status,
                error = %e,
                "Failed to persist inquiry status"
            ),
        }
    }
}
