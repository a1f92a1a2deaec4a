//! Webhook HTTP surface
//!
//! Every Slack endpoint verifies the request signature over the raw body
//! before decoding anything.

use super::events::{SlackEnvelope, SlackEvent, SlashCommand};
use super::pipeline::{Job, JobSender};
use crate::error::SleuthError;
use crate::gate::SignatureGate;
use crate::storage::{Database, InquiryStatus, ReactionEventType};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Recent inquiries listed by `/inquiry-status`
const STATUS_LIMIT: usize = 5;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub gate: SignatureGate,
    pub jobs: JobSender,
    pub db: Arc<Database>,
    pub trigger_emoji: String,
}

/// Build the webhook router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/slack/events", post(slack_events))
        .route("/api/v1/slack/slash", post(slash_command))
        .route("/api/v1/slack/interactive", post(interactive))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "invalid signature" })),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn ephemeral(text: impl Into<String>) -> Response {
    Json(json!({ "response_type": "ephemeral", "text": text.into() })).into_response()
}

fn submit(state: &AppState, job: Job) -> Response {
    match state.jobs.submit(job) {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to queue job");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "busy" })),
            )
                .into_response()
        }
    }
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.gate.verify(&body, &headers) {
        tracing::error!("Invalid Slack signature on event");
        return unauthorized();
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let e = SleuthError::Json {
                source: e,
                context: "Slack event payload".to_string(),
            };
            tracing::error!(error = %e, "Failed to parse Slack event");
            return bad_request("invalid JSON");
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            let notice = match event {
                SlackEvent::ReactionAdded(payload) => payload.into_notice(ReactionEventType::Added),
                SlackEvent::ReactionRemoved(payload) => {
                    payload.into_notice(ReactionEventType::Removed)
                }
                SlackEvent::Message => {
                    tracing::debug!("Received message event");
                    None
                }
                SlackEvent::Other => {
                    tracing::debug!("Unhandled event type");
                    None
                }
            };

            match notice {
                Some(notice) => submit(&state, Job::Reaction(notice)),
                None => Json(json!({ "status": "ok" })).into_response(),
            }
        }
        SlackEnvelope::Unknown => Json(json!({ "status": "ok" })).into_response(),
    }
}

async fn slash_command(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.gate.verify(&body, &headers) {
        tracing::error!("Invalid Slack signature on slash command");
        return unauthorized();
    }

    let Some(command) = SlashCommand::from_form(&body) else {
        return bad_request("invalid form");
    };

    tracing::info!(
        command = %command.command,
        user_id = %command.user_id,
        channel_id = %command.channel_id,
        "Received slash command"
    );

    match command.command.as_str() {
        "/inquiry-help" => ephemeral(help_text(&state.trigger_emoji)),
        "/inquiry-status" => ephemeral(status_text(&state.db)),
        "/inquiry" => {
            let question = command.text.trim();
            if question.is_empty() {
                return ephemeral("Usage: `/inquiry <your question>`");
            }
            match state.jobs.submit(Job::InquiryRequest {
                channel_id: command.channel_id.clone(),
                user_id: command.user_id.clone(),
                question: question.to_string(),
            }) {
                Ok(()) => ephemeral("Looking into it, an answer will be posted in thread."),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to queue inquiry request");
                    ephemeral("The assistant is busy right now, please try again shortly.")
                }
            }
        }
        _ => ephemeral("Unknown command. Use `/inquiry-help` for help."),
    }
}

async fn interactive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.gate.verify(&body, &headers) {
        tracing::error!("Invalid Slack signature on interactive callback");
        return unauthorized();
    }

    tracing::info!("Received interactive component");
    Json(json!({ "status": "ok" })).into_response()
}

fn help_text(trigger_emoji: &str) -> String {
    format!(
        "*Inquiry Assistant Help*\n\n\
         This bot answers team inquiries by searching past Slack discussions and Confluence documentation.\n\n\
         *How to use:*\n\
         1. React to any message with the :{}: emoji to trigger an AI-powered response\n\
         2. The bot searches for similar discussions and documentation\n\
         3. An AI-generated response is posted as a thread reply\n\n\
         *Commands:*\n\
         • `/inquiry <question>` - Ask a question directly\n\
         • `/inquiry-help` - Show this help message\n\
         • `/inquiry-status` - Show bot status and recent activity",
        trigger_emoji
    )
}

fn status_icon(status: InquiryStatus) -> &'static str {
    match status {
        InquiryStatus::Completed => "✅",
        InquiryStatus::Failed => "❌",
        InquiryStatus::Processing => "⏳",
        InquiryStatus::Pending => "❓",
    }
}

fn status_text(db: &Database) -> String {
    let inquiries = match db.list_recent_inquiries(STATUS_LIMIT) {
        Ok(inquiries) => inquiries,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list recent inquiries");
            return "❌ Error retrieving status information".to_string();
        }
    };

    let mut response = String::from("*Inquiry Assistant Status*\n\n✅ Bot is running and operational\n\n");

    if inquiries.is_empty() {
        response.push_str("No recent inquiries processed.");
        return response;
    }

    response.push_str(&format!(
        "*Recent Activity* (last {} inquiries):\n",
        inquiries.len()
    ));
    for inquiry in &inquiries {
        response.push_str(&format!(
            "{} {} - {}\n{}\n",
            status_icon(inquiry.status),
            inquiry.created_at.format("%b %-d %H:%M"),
            inquiry.status,
            inquiry.message_text
        ));
    }

    response
}
