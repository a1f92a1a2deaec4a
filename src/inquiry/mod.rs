//! Inquiry processing: reaction intake, orchestration, prompts and fallbacks

pub mod fallback;
pub mod intake;
pub mod orchestrator;
pub mod prompt;

pub use fallback::{fallback_response, NO_RESULTS_FALLBACK};
pub use intake::{IntakeOutcome, ReactionIntake, ReactionNotice};
pub use orchestrator::{Deadlines, InquiryOrchestrator, REPLY_HEADER};
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};
