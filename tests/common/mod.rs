// In-memory stand-ins for Slack, Confluence and the LLM gateway
#![allow(dead_code)]

use async_trait::async_trait;
use sleuth::error::{Result, ServiceError, ServiceErrorKind};
use sleuth::inquiry::{Deadlines, InquiryOrchestrator, ReactionIntake, ReactionNotice};
use sleuth::search::{SanitizedQuery, SearchEngine, SearchSettings};
use sleuth::sources::{AnswerGenerator, ChatHit, ChatMessage, ChatPlatform, DocPage, DocsPlatform};
use sleuth::storage::{Database, ReactionEventType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const CHANNEL: &str = "C0123";
pub const TRIGGER: &str = "eyes";

/// A threaded reply captured by [`FakeChat`]
#[derive(Debug, Clone)]
pub struct PostedReply {
    pub channel: String,
    pub thread_ts: String,
    pub text: String,
}

#[derive(Default)]
pub struct FakeChat {
    pub messages: Mutex<HashMap<String, ChatMessage>>,
    pub hits: Mutex<Vec<ChatHit>>,
    pub users: Mutex<HashMap<String, String>>,
    pub replies: Mutex<Vec<PostedReply>>,
    pub posted: Mutex<Vec<String>>,
    pub fail_search: bool,
    pub fail_reply: bool,
    pub fetch_delay: Duration,
    pub search_delay: Duration,
    pub fetch_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
}

impl FakeChat {
    pub fn add_message(&self, ts: &str, user: &str, text: &str) {
        self.messages.lock().unwrap().insert(
            ts.to_string(),
            ChatMessage {
                ts: ts.to_string(),
                channel: CHANNEL.to_string(),
                user: user.to_string(),
                text: text.to_string(),
            },
        );
    }

    pub fn add_hit(&self, ts: &str, user: &str, text: &str) {
        self.hits.lock().unwrap().push(ChatHit {
            ts: ts.to_string(),
            channel: CHANNEL.to_string(),
            user: user.to_string(),
            text: text.to_string(),
        });
    }

    pub fn add_user(&self, id: &str, name: &str) {
        self.users
            .lock()
            .unwrap()
            .insert(id.to_string(), name.to_string());
    }

    pub fn replies(&self) -> Vec<PostedReply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn fetch_message(&self, _channel: &str, ts: &str) -> Result<ChatMessage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.fetch_delay).await;
        let found = self.messages.lock().unwrap().get(ts).cloned();
        found.ok_or_else(|| {
            ServiceError::new("slack", ServiceErrorKind::BadRequest, "message not found").into()
        })
    }

    async fn search_messages(&self, _query: &str, _days_back: u32) -> Result<Vec<ChatHit>> {
        tokio::time::sleep(self.search_delay).await;
        if self.fail_search {
            return Err(ServiceError::new("slack", ServiceErrorKind::Server, "search down").into());
        }
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn post_message(&self, _channel: &str, text: &str) -> Result<String> {
        let mut posted = self.posted.lock().unwrap();
        posted.push(text.to_string());
        Ok(format!("1700000900.{:06}", posted.len()))
    }

    async fn post_thread_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<String> {
        if self.fail_reply {
            return Err(ServiceError::new("slack", ServiceErrorKind::Auth, "not_in_channel").into());
        }
        let mut replies = self.replies.lock().unwrap();
        replies.push(PostedReply {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            text: text.to_string(),
        });
        Ok(format!("1700001000.{:06}", replies.len()))
    }

    async fn resolve_user(&self, user_id: &str) -> Result<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeDocs {
    pub pages: Mutex<Vec<DocPage>>,
    pub fail: bool,
    pub delay: Duration,
}

impl FakeDocs {
    pub fn add_page(&self, id: &str, title: &str, content: &str) {
        self.pages.lock().unwrap().push(DocPage {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            url: format!("https://wiki.example.com/pages/viewpage.action?pageId={}", id),
            author: "Docs Team".to_string(),
            updated: None,
        });
    }
}

#[async_trait]
impl DocsPlatform for FakeDocs {
    async fn search_pages(&self, _query: &SanitizedQuery) -> Result<Vec<DocPage>> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ServiceError::new("confluence", ServiceErrorKind::Auth, "bad token").into());
        }
        Ok(self.pages.lock().unwrap().clone())
    }
}

pub struct FakeGenerator {
    pub answer: std::result::Result<String, ServiceErrorKind>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ServiceErrorKind) -> Self {
        Self {
            answer: Err(kind),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn generate(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(text) => Ok(text.clone()),
            Err(kind) => Err(ServiceError::new("llm", *kind, "upstream refused").into()),
        }
    }
}

pub fn settings() -> SearchSettings {
    SearchSettings {
        similarity_threshold: 0.3,
        max_results: 5,
        days_back: 30,
        source_timeout: Duration::from_secs(2),
        workspace_url: "https://acme.slack.com".to_string(),
    }
}

pub fn deadlines() -> Deadlines {
    Deadlines {
        generation: Duration::from_secs(2),
        reply: Duration::from_secs(2),
    }
}

pub fn temp_db() -> (TempDir, Arc<Database>) {
    let dir = TempDir::new().unwrap();
    let db = Database::new(&dir.path().join("sleuth.db")).unwrap();
    (dir, Arc::new(db))
}

/// Wired pipeline over the fakes
pub struct Harness {
    pub _dir: TempDir,
    pub db: Arc<Database>,
    pub chat: Arc<FakeChat>,
    pub docs: Arc<FakeDocs>,
    pub generator: Arc<FakeGenerator>,
    pub intake: Arc<ReactionIntake>,
}

impl Harness {
    pub fn new(chat: FakeChat, docs: FakeDocs, generator: FakeGenerator) -> Self {
        let (dir, db) = temp_db();
        let chat = Arc::new(chat);
        let docs = Arc::new(docs);
        let generator = Arc::new(generator);

        let search = SearchEngine::new(chat.clone(), docs.clone(), db.clone(), settings());
        let orchestrator = Arc::new(InquiryOrchestrator::new(
            db.clone(),
            search,
            chat.clone(),
            generator.clone(),
            deadlines(),
        ));
        let intake = Arc::new(ReactionIntake::new(
            db.clone(),
            chat.clone(),
            orchestrator,
            TRIGGER,
        ));

        Self {
            _dir: dir,
            db,
            chat,
            docs,
            generator,
            intake,
        }
    }
}

pub fn reaction(message_id: &str, emoji: &str, event_type: ReactionEventType) -> ReactionNotice {
    ReactionNotice {
        message_id: message_id.to_string(),
        channel_id: CHANNEL.to_string(),
        user_id: "U_REACTOR".to_string(),
        reaction: emoji.to_string(),
        event_type,
        event_ts: "1700000500.000001".to_string(),
    }
}
