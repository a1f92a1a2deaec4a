use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Sleuth
#[derive(Error, Debug)]
pub enum SleuthError {
    /// Configuration related errors (missing credentials, unusable settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Inbound request rejected at the boundary (bad signature, malformed payload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Slack, Confluence or LLM call failed
    #[error(transparent)]
    External(#[from] ServiceError),

    /// An external call did not finish within its bound
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    /// The dispatch queue cannot take more work right now
    #[error("Dispatch queue is full")]
    QueueFull,

    /// Another pipeline already owns this message
    #[error("Inquiry already exists for message {message_id}")]
    DuplicateInquiry { message_id: String },

    /// The triggering message has no text to answer
    #[error("Message {message_id} is empty")]
    EmptyMessage { message_id: String },

    /// Inquiry lookup failed
    #[error("Inquiry not found: {0}")]
    InquiryNotFound(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SleuthError {
    /// True when the error came from the `inquiries.message_id` uniqueness constraint
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SleuthError::DuplicateInquiry { .. })
    }
}

/// Category of an external service failure.
///
/// Used for logging and diagnostics only; control flow treats every kind as
/// "this source/step failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Auth,
    RateLimit,
    Server,
    BadRequest,
    Transport,
    Decode,
    NotConfigured,
}

impl ServiceErrorKind {
    /// Map an HTTP status code to an error category
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ServiceErrorKind::Auth,
            429 => ServiceErrorKind::RateLimit,
            500..=599 => ServiceErrorKind::Server,
            _ => ServiceErrorKind::BadRequest,
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceErrorKind::Auth => "auth",
            ServiceErrorKind::RateLimit => "rate-limit",
            ServiceErrorKind::Server => "server",
            ServiceErrorKind::BadRequest => "bad-request",
            ServiceErrorKind::Transport => "transport",
            ServiceErrorKind::Decode => "decode",
            ServiceErrorKind::NotConfigured => "not-configured",
        };
        f.write_str(s)
    }
}

/// Failure of one of the external collaborators
#[derive(Error, Debug, Clone)]
#[error("{service} {kind} error: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    /// Build from a reqwest transport error
    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        let kind = match err.status() {
            Some(status) => ServiceErrorKind::from_status(status.as_u16()),
            None if err.is_decode() => ServiceErrorKind::Decode,
            None => ServiceErrorKind::Transport,
        };
        Self::new(service, kind, err.to_string())
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Sleuth operations
pub type Result<T> = std::result::Result<T, SleuthError>;
