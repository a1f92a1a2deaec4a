mod common;

use common::{reaction, FakeChat, FakeDocs, FakeGenerator, Harness, CHANNEL, TRIGGER};
use sleuth::error::{ServiceErrorKind, SleuthError};
use sleuth::inquiry::{IntakeOutcome, NO_RESULTS_FALLBACK, REPLY_HEADER};
use sleuth::storage::{InquiryStatus, ReactionEventType, ResultSource};
use std::sync::atomic::Ordering;
use std::time::Duration;

const MESSAGE_TS: &str = "1700000000.000100";
const QUESTION: &str = "How do I rotate the staging database password?";

fn processed(outcome: IntakeOutcome) -> sleuth::storage::Inquiry {
    match outcome {
        IntakeOutcome::Processed(inquiry) => inquiry,
        other => panic!("expected a processed inquiry, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reaction_completes_inquiry() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    chat.add_hit(
        "1699990000.000200",
        "U_OPS",
        "Rotate the staging database password through vault, then restart the app",
    );
    chat.add_user("U_OPS", "Ops Person");
    let docs = FakeDocs::default();
    docs.add_page("42", "Database runbook", "Where the password lives and who owns it");

    let h = Harness::new(chat, docs, FakeGenerator::answering("Use vault."));

    let outcome = h
        .intake
        .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
        .await
        .unwrap();
    let inquiry = processed(outcome);

    assert_eq!(inquiry.status, InquiryStatus::Completed);
    assert!(inquiry.response_sent);
    assert!(inquiry.processed_at.is_some());
    assert_eq!(inquiry.response_text, "Use vault.");
    assert_eq!(inquiry.user_id, "U_AUTHOR");

    let replies = h.chat.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].channel, CHANNEL);
    assert_eq!(replies[0].thread_ts, MESSAGE_TS);
    assert_eq!(replies[0].text, format!("{}Use vault.", REPLY_HEADER));
    assert_eq!(inquiry.reply_thread_id, "1700001000.000001");

    let stored = h.db.get_inquiry_by_message_id(MESSAGE_TS).unwrap().unwrap();
    assert_eq!(stored.status, InquiryStatus::Completed);
    assert_eq!(stored.search_results.len(), 2);
    let chat_result = stored
        .search_results
        .iter()
        .find(|r| r.source == ResultSource::Chat)
        .unwrap();
    assert_eq!(chat_result.author, "Ops Person");
    assert_eq!(chat_result.score, 1.0);

    let events = h.db.reaction_events_for_message(MESSAGE_TS).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].processed);
    assert_eq!(events[0].inquiry_id, Some(inquiry.id));
}

#[tokio::test]
async fn test_second_reaction_is_already_processed() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("Answer"));

    let first = processed(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
            .await
            .unwrap(),
    );
    let second = h
        .intake
        .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
        .await
        .unwrap();

    match second {
        IntakeOutcome::AlreadyProcessed { inquiry_id } => assert_eq!(inquiry_id, first.id),
        other => panic!("expected AlreadyProcessed, got {:?}", other),
    }
    assert_eq!(h.chat.replies().len(), 1);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 1);

    let events = h.db.reaction_events_for_message(MESSAGE_TS).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.inquiry_id == Some(first.id)));
}

#[tokio::test]
async fn test_concurrent_reactions_produce_one_reply() {
    let chat = FakeChat {
        fetch_delay: Duration::from_millis(50),
        ..Default::default()
    };
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("Answer"));

    let (a, b) = tokio::join!(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added)),
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let processed_count = outcomes
        .iter()
        .filter(|o| matches!(o, IntakeOutcome::Processed(_)))
        .count();
    let skipped_count = outcomes
        .iter()
        .filter(|o| matches!(o, IntakeOutcome::AlreadyProcessed { .. }))
        .count();
    assert_eq!(processed_count, 1);
    assert_eq!(skipped_count, 1);

    assert_eq!(h.chat.fetch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.chat.replies().len(), 1);
    assert_eq!(h.db.stats().unwrap().inquiry_count, 1);
}

#[tokio::test]
async fn test_rate_limited_generation_sends_fixed_fallback() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(
        chat,
        FakeDocs::default(),
        FakeGenerator::failing(ServiceErrorKind::RateLimit),
    );

    let inquiry = processed(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
            .await
            .unwrap(),
    );

    assert_eq!(inquiry.status, InquiryStatus::Failed);
    assert_eq!(inquiry.response_text, NO_RESULTS_FALLBACK);
    assert!(inquiry.response_sent);
    assert!(inquiry.processed_at.is_none());

    let replies = h.chat.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, format!("{}{}", REPLY_HEADER, NO_RESULTS_FALLBACK));

    let stored = h.db.get_inquiry(inquiry.id).unwrap().unwrap();
    assert_eq!(stored.status, InquiryStatus::Failed);
}

#[tokio::test]
async fn test_fallback_lists_top_results() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    chat.add_hit("1699990000.000200", "U_OPS", "rotate staging database password");
    let h = Harness::new(
        chat,
        FakeDocs::default(),
        FakeGenerator::failing(ServiceErrorKind::Server),
    );

    let inquiry = processed(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
            .await
            .unwrap(),
    );

    assert_eq!(inquiry.status, InquiryStatus::Failed);
    assert!(inquiry
        .response_text
        .starts_with("I found some potentially relevant information:"));
    assert!(inquiry.response_text.contains("**Slack Message** (Slack)"));
}

#[tokio::test]
async fn test_delivery_failure_keeps_answer() {
    let chat = FakeChat {
        fail_reply: true,
        ..Default::default()
    };
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("Use vault."));

    let inquiry = processed(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
            .await
            .unwrap(),
    );

    assert_eq!(inquiry.status, InquiryStatus::Failed);
    assert_eq!(inquiry.response_text, "Use vault.");
    assert!(!inquiry.response_sent);
    assert!(inquiry.reply_thread_id.is_empty());

    let stored = h.db.get_inquiry(inquiry.id).unwrap().unwrap();
    assert_eq!(stored.status, InquiryStatus::Failed);
    assert_eq!(stored.response_text, "Use vault.");
}

#[tokio::test]
async fn test_empty_message_creates_no_inquiry() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", "   ");
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("unused"));

    let err = h
        .intake
        .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
        .await
        .unwrap_err();

    assert!(matches!(err, SleuthError::EmptyMessage { .. }));
    assert!(h.db.find_inquiry_by_message_id(MESSAGE_TS).unwrap().is_none());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);

    let events = h.db.reaction_events_for_message(MESSAGE_TS).unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].processed);
}

#[tokio::test]
async fn test_removed_reaction_is_recorded_only() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("unused"));

    let outcome = h
        .intake
        .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Removed))
        .await
        .unwrap();

    assert!(matches!(outcome, IntakeOutcome::Ignored));
    assert_eq!(h.chat.fetch_calls.load(Ordering::SeqCst), 0);

    let events = h.db.reaction_events_for_message(MESSAGE_TS).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ReactionEventType::Removed);
}

#[tokio::test]
async fn test_other_emoji_is_ignored() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", QUESTION);
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("unused"));

    let outcome = h
        .intake
        .on_reaction(reaction(MESSAGE_TS, "thumbsup", ReactionEventType::Added))
        .await
        .unwrap();

    assert!(matches!(outcome, IntakeOutcome::Ignored));
    assert!(h.db.reaction_events_for_message(MESSAGE_TS).unwrap().is_empty());
    assert_eq!(h.db.stats().unwrap().inquiry_count, 0);
}

#[tokio::test]
async fn test_stopword_question_skips_search() {
    let chat = FakeChat::default();
    chat.add_message(MESSAGE_TS, "U_AUTHOR", "how is it?");
    chat.add_hit("1699990000.000200", "U_OPS", "anything at all");
    let h = Harness::new(chat, FakeDocs::default(), FakeGenerator::answering("Fine."));

    let inquiry = processed(
        h.intake
            .on_reaction(reaction(MESSAGE_TS, TRIGGER, ReactionEventType::Added))
            .await
            .unwrap(),
    );

    assert_eq!(inquiry.status, InquiryStatus::Completed);
    assert!(h.db.search_results_for(inquiry.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_inquiry_request_posts_question_then_replies() {
    let h = Harness::new(
        FakeChat::default(),
        FakeDocs::default(),
        FakeGenerator::answering("Use vault."),
    );

    let inquiry = h
        .intake
        .on_inquiry_request(CHANNEL, "U_ASKER", QUESTION)
        .await
        .unwrap();

    let posted = h.chat.posted.lock().unwrap().clone();
    assert_eq!(posted, vec![format!("<@U_ASKER> asked: {}", QUESTION)]);

    assert_eq!(inquiry.status, InquiryStatus::Completed);
    assert_eq!(inquiry.message_id, "1700000900.000001");
    assert_eq!(inquiry.user_id, "U_ASKER");

    let replies = h.chat.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].thread_ts, inquiry.message_id);
}

#[tokio::test]
async fn test_inquiry_request_requires_question() {
    let h = Harness::new(
        FakeChat::default(),
        FakeDocs::default(),
        FakeGenerator::answering("unused"),
    );

    let err = h
        .intake
        .on_inquiry_request(CHANNEL, "U_ASKER", "  ")
        .await
        .unwrap_err();

    assert!(matches!(err, SleuthError::Validation(_)));
    assert!(h.chat.posted.lock().unwrap().is_empty());
}
