use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes shared by the parsing core, the batch orchestrator and the analyzer boundary.
pub mod codes {
    pub const ALERT_PARSE_FAILED: &str = "ALERT_PARSE_FAILED";
    pub const ALERT_EMPTY_TEXT: &str = "ALERT_EMPTY_TEXT";

    pub const SOURCE_NOT_FOUND: &str = "SOURCE_NOT_FOUND";
    pub const SOURCE_READ_FAILED: &str = "SOURCE_READ_FAILED";
    pub const SOURCE_DECODE_FAILED: &str = "SOURCE_DECODE_FAILED";
    pub const SOURCE_NO_ALERTS: &str = "SOURCE_NO_ALERTS";

    pub const BATCH_LISTING_FAILED: &str = "BATCH_LISTING_FAILED";
    pub const BATCH_WORKER_PANICKED: &str = "BATCH_WORKER_PANICKED";
    pub const BATCH_CANCELLED: &str = "BATCH_CANCELLED";

    pub const CONFIG_READ_FAILED: &str = "CONFIG_READ_FAILED";
    pub const CONFIG_PARSE_FAILED: &str = "CONFIG_PARSE_FAILED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    pub const EXPORT_ENCODE_FAILED: &str = "EXPORT_ENCODE_FAILED";
    pub const EXPORT_WRITE_FAILED: &str = "EXPORT_WRITE_FAILED";

    pub const AI_REMOTE_NOT_ALLOWED: &str = "AI_REMOTE_NOT_ALLOWED";
    pub const AI_ANALYZE_FAILED: &str = "AI_ANALYZE_FAILED";
    pub const AI_OLLAMA_UNREACHABLE: &str = "AI_OLLAMA_UNREACHABLE";
    pub const AI_OLLAMA_UNHEALTHY: &str = "AI_OLLAMA_UNHEALTHY";
}

/// Single structured error shape used across the parsing core, batch layer and analyzer boundary.
///
/// Errors are values: a failed alert or a failed source is recorded as data in its result slot
/// and never unwinds through sibling work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    /// Human-readable one-liner including details, used for batch error entries.
    pub fn describe(&self) -> String {
        match &self.details {
            Some(d) => format!("{self} ({d})"),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
