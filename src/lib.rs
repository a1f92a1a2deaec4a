//! Sleuth - Slack inquiry assistant
//!
//! Watches Slack for a trigger emoji reaction, searches past Slack discussions
//! and Confluence pages for related evidence, asks a language model for an
//! answer, and posts it back in thread.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod gate;
pub mod inquiry;
pub mod search;
pub mod sources;
pub mod storage;

pub use error::{Result, SleuthError};
