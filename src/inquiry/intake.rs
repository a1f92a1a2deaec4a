//! Reaction intake: trigger filtering, idempotency, message fetch

use super::orchestrator::InquiryOrchestrator;
use crate::error::{Result, SleuthError};
use crate::sources::ChatPlatform;
use crate::storage::{
    Database, Inquiry, NewInquiry, NewReactionEvent, ReactionEvent, ReactionEventType,
};
use std::sync::Arc;

/// A reaction observed on a message
#[derive(Debug, Clone)]
pub struct ReactionNotice {
    /// Timestamp of the reacted-to message
    pub message_id: String,
    pub channel_id: String,
    /// User who reacted
    pub user_id: String,
    pub reaction: String,
    pub event_type: ReactionEventType,
    pub event_ts: String,
}

/// What intake did with a reaction
#[derive(Debug)]
pub enum IntakeOutcome {
    /// Not the trigger emoji being added
    Ignored,
    /// The message already has an inquiry
    AlreadyProcessed { inquiry_id: i64 },
    /// A new inquiry ran to a terminal state
    Processed(Inquiry),
}

/// Entry points for reactions and explicit inquiry requests
pub struct ReactionIntake {
    db: Arc<Database>,
    chat: Arc<dyn ChatPlatform>,
    orchestrator: Arc<InquiryOrchestrator>,
    trigger_emoji: String,
}

impl ReactionIntake {
    pub fn new(
        db: Arc<Database>,
        chat: Arc<dyn ChatPlatform>,
        orchestrator: Arc<InquiryOrchestrator>,
        trigger_emoji: impl Into<String>,
    ) -> Self {
        Self {
            db,
            chat,
            orchestrator,
            trigger_emoji: trigger_emoji.into(),
        }
    }

    /// Handle a reaction event.
    ///
    /// Every trigger-emoji reaction is recorded; only additions on messages
    /// without an inquiry start the pipeline.
    pub async fn on_reaction(&self, notice: ReactionNotice) -> Result<IntakeOutcome> {
        if notice.reaction != self.trigger_emoji {
            return Ok(IntakeOutcome::Ignored);
        }

        let event = self.db.record_reaction_event(&NewReactionEvent {
            message_id: notice.message_id.clone(),
            channel_id: notice.channel_id.clone(),
            user_id: notice.user_id.clone(),
            reaction: notice.reaction.clone(),
            event_type: notice.event_type,
            source_timestamp: notice.event_ts.clone(),
        })?;

        if notice.event_type != ReactionEventType::Added {
            return Ok(IntakeOutcome::Ignored);
        }

        tracing::info!(
            message_id = %notice.message_id,
            channel_id = %notice.channel_id,
            reaction = %notice.reaction,
            "Processing trigger emoji reaction"
        );

        // Fast path only; the unique constraint on message_id is what closes the race
        if let Some(existing) = self.db.find_inquiry_by_message_id(&notice.message_id)? {
            tracing::info!(
                message_id = %notice.message_id,
                inquiry_id = existing.id,
                "Message already processed, skipping"
            );
            self.db.mark_reaction_processed(event.id, existing.id)?;
            return Ok(IntakeOutcome::AlreadyProcessed {
                inquiry_id: existing.id,
            });
        }

        let message = self
            .chat
            .fetch_message(&notice.channel_id, &notice.message_id)
            .await?;

        if message.text.trim().is_empty() {
            tracing::info!(message_id = %notice.message_id, "Message is empty");
            return Err(SleuthError::EmptyMessage {
                message_id: notice.message_id,
            });
        }

        let new = NewInquiry {
            message_id: notice.message_id.clone(),
            channel_id: notice.channel_id.clone(),
            user_id: if message.user.is_empty() {
                notice.user_id.clone()
            } else {
                message.user
            },
            message_text: message.text,
            source_timestamp: if message.ts.is_empty() {
                notice.message_id.clone()
            } else {
                message.ts
            },
        };

        let outcome = self.orchestrator.process(new).await;
        self.link_event(&event, &notice.message_id, &outcome);

        match outcome {
            Ok(inquiry) => Ok(IntakeOutcome::Processed(inquiry)),
            Err(SleuthError::DuplicateInquiry { message_id }) => {
                tracing::info!(message_id = %message_id, "Lost race for message, treating as processed");
                match self.db.find_inquiry_by_message_id(&message_id)? {
                    Some(existing) => Ok(IntakeOutcome::AlreadyProcessed {
                        inquiry_id: existing.id,
                    }),
                    None => Err(SleuthError::InquiryNotFound(message_id)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Post an explicit question to a channel and answer it in thread
    pub async fn on_inquiry_request(
        &self,
        channel_id: &str,
        user_id: &str,
        question: &str,
    ) -> Result<Inquiry> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SleuthError::Validation(
                "inquiry request has no question".to_string(),
            ));
        }

        let posted_ts = self
            .chat
            .post_message(channel_id, &format!("<@{}> asked: {}", user_id, question))
            .await?;

        tracing::info!(channel_id, user_id, message_id = %posted_ts, "Received inquiry request");

        self.orchestrator
            .process(NewInquiry {
                message_id: posted_ts.clone(),
                channel_id: channel_id.to_string(),
                user_id: user_id.to_string(),
                message_text: question.to_string(),
                source_timestamp: posted_ts,
            })
            .await
    }

    /// Link the reaction to whatever inquiry now exists for the message
    fn link_event(&self, event: &ReactionEvent, message_id: &str, outcome: &Result<Inquiry>) {
        let inquiry_id = match outcome {
            Ok(inquiry) => Some(inquiry.id),
            Err(_) => match self.db.find_inquiry_by_message_id(message_id) {
                Ok(found) => found.map(|i| i.id),
                Err(e) => {
                    tracing::error!(message_id, error = %e, "Failed to look up inquiry for reaction");
                    None
                }
            },
        };

        if let Some(inquiry_id) = inquiry_id {
            if let Err(e) = self.db.mark_reaction_processed(event.id, inquiry_id) {
                tracing::error!(event_id = event.id, error = %e, "Failed to mark reaction processed");
            }
        }
    }
}
