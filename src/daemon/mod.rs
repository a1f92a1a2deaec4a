// Daemon module: webhook server and event dispatch

pub mod events;
pub mod http;
pub mod pipeline;
pub mod signals;

pub use events::{ReactionItem, ReactionPayload, SlackEnvelope, SlackEvent, SlashCommand};
pub use http::{router, AppState};
pub use pipeline::{DispatchSettings, Dispatcher, Job, JobHandler, JobSender};
pub use signals::SignalHandler;

use crate::config::{expand_tilde, Config, Credentials};
use crate::error::{Result, SleuthError};
use crate::gate::SignatureGate;
use crate::inquiry::{Deadlines, InquiryOrchestrator, ReactionIntake};
use crate::search::{SearchEngine, SearchSettings};
use crate::sources::{
    AnswerGenerator, ChatPlatform, ConfluenceClient, DocsPlatform, LiteLlmClient, SlackClient,
};
use crate::storage::Database;
use std::sync::Arc;

/// Owns the wired components and runs the webhook server
pub struct Daemon {
    config: Config,
    gate: SignatureGate,
    db: Arc<Database>,
    intake: Arc<ReactionIntake>,
}

impl Daemon {
    /// Wire production clients from configuration and credentials
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let db_path = expand_tilde(&config.storage.db_path);
        let db = Arc::new(Database::with_pool_size(
            &db_path,
            config.storage.max_connections,
        )?);

        if credentials.slack_signing_secret.is_none() {
            tracing::error!(
                "Slack signing secret not configured ({}), every webhook request will be rejected",
                config.slack.signing_secret_env
            );
        }
        if credentials.slack_bot_token.is_none() {
            tracing::warn!(
                "Slack bot token not configured ({}), Slack calls will fail",
                config.slack.bot_token_env
            );
        }

        let chat: Arc<dyn ChatPlatform> = Arc::new(SlackClient::new(
            &config.slack,
            config.search.max_results,
            credentials.slack_bot_token.clone(),
        ));
        let docs: Arc<dyn DocsPlatform> = Arc::new(ConfluenceClient::new(
            &config.confluence,
            config.search.max_results,
            credentials.confluence_api_token.clone(),
        )?);
        let generator: Arc<dyn AnswerGenerator> = Arc::new(LiteLlmClient::new(
            &config.llm,
            credentials.llm_api_key.clone(),
        ));

        let gate = SignatureGate::new(credentials.slack_signing_secret);
        Ok(Self::from_parts(config, gate, db, chat, docs, generator))
    }

    /// Wire the pipeline around explicit collaborators
    pub fn from_parts(
        config: Config,
        gate: SignatureGate,
        db: Arc<Database>,
        chat: Arc<dyn ChatPlatform>,
        docs: Arc<dyn DocsPlatform>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let search = SearchEngine::new(
            chat.clone(),
            docs,
            db.clone(),
            SearchSettings::from_config(&config),
        );
        let orchestrator = Arc::new(InquiryOrchestrator::new(
            db.clone(),
            search,
            chat.clone(),
            generator,
            Deadlines::from_config(&config),
        ));
        let intake = Arc::new(ReactionIntake::new(
            db.clone(),
            chat,
            orchestrator,
            config.slack.trigger_emoji.clone(),
        ));

        Self {
            config,
            gate,
            db,
            intake,
        }
    }

    /// Serve webhooks until a shutdown signal, then drain queued jobs
    pub async fn run(self) -> Result<()> {
        let dispatcher = Dispatcher::new(
            self.intake.clone(),
            DispatchSettings::from(&self.config.pipeline),
        );

        let app = router(AppState {
            gate: self.gate.clone(),
            jobs: dispatcher.sender(),
            db: self.db.clone(),
            trigger_emoji: self.config.slack.trigger_emoji.clone(),
        });

        let signal_handler = SignalHandler::new()?;

        let bind_addr = self.config.server.bind_addr.as_str();
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| SleuthError::Io {
                source: e,
                context: format!("Failed to bind {}", bind_addr),
            })?;

        tracing::info!(
            bind_addr,
            trigger_emoji = %self.config.slack.trigger_emoji,
            "Webhook server listening"
        );

        // The router (and its job senders) is dropped when serve returns
        axum::serve(listener, app)
            .with_graceful_shutdown(signals::shutdown_signal(signal_handler))
            .await
            .map_err(|e| SleuthError::Io {
                source: e,
                context: "Webhook server failed".to_string(),
            })?;

        dispatcher.shutdown().await;
        tracing::info!("Daemon shutdown complete");

        Ok(())
    }
}
