use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const UNKNOWN_ID: &str = "unknown";
pub const UNKNOWN_SERVICE: &str = "unknown service";
pub const NO_ERROR_INFORMATION: &str = "no error information";

/// Canonical incident lifecycle state. Free-text status tokens never leave the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Active,
    Resolved,
    Closed,
    Unknown,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Active => "ACTIVE",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Closed => "CLOSED",
            AlertStatus::Unknown => "UNKNOWN",
        }
    }

    /// Exact (case-insensitive) keyword lookup. Use `normalize::status::classify_status` for free text.
    pub fn from_keyword(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(AlertStatus::Open),
            "ACTIVE" => Some(AlertStatus::Active),
            "RESOLVED" => Some(AlertStatus::Resolved),
            "CLOSED" => Some(AlertStatus::Closed),
            _ => None,
        }
    }

    pub fn requires_attention(&self) -> bool {
        matches!(self, AlertStatus::Open | AlertStatus::Active)
    }

    pub fn is_known(&self) -> bool {
        *self != AlertStatus::Unknown
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cascade stage produced the extracted fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Strict,
    Tagged,
    Heuristic,
}

impl ParseStage {
    pub fn confidence(&self) -> Confidence {
        match self {
            ParseStage::Strict => Confidence::Full,
            ParseStage::Tagged | ParseStage::Heuristic => Confidence::Degraded,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Full,
    Degraded,
}

/// Period over which logs should be inspected for an alert. Always `start <= end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogCheckWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl LogCheckWindow {
    /// Builds a window, ordering the bounds if they arrive inverted.
    pub fn new(a: OffsetDateTime, b: OffsetDateTime) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }
}

/// One parsed incident. Built once by the record assembler and never mutated afterwards.
///
/// Notes:
/// - `id`, `status` and `service` are always populated, with sentinels when unresolved.
/// - `timestamp_raw` keeps the literal "detected at" phrase; `detected_start`/`detected_end`
///   keep the offset that phrase declared (or UTC, with a warning, when none was declared).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub id: String,
    pub status: AlertStatus,
    pub service: String,
    pub environment: Option<String>,
    pub http_code: Option<String>,

    pub timestamp_raw: Option<String>,
    pub timestamp_end_raw: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub detected_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub detected_end: Option<OffsetDateTime>,
    pub duration_raw: Option<String>,

    pub services_impacted: u32,
    pub error_message: String,

    pub metric: Option<String>,
    pub metric_event: Option<String>,
    pub request: Option<String>,
    pub threshold: Option<f64>,
    pub current_value: Option<f64>,
    pub severity: Option<String>,
    pub host: Option<String>,
    pub detail_url: Option<String>,
    pub openshift_projects: Vec<String>,

    pub log_check_window: LogCheckWindow,

    pub stage: ParseStage,
    pub confidence: Confidence,
    pub warnings: Vec<ValidationWarning>,
    pub raw_text: String,
}

impl AlertRecord {
    pub fn has_resolved_id(&self) -> bool {
        self.id != UNKNOWN_ID
    }

    pub fn has_error_information(&self) -> bool {
        self.error_message != NO_ERROR_INFORMATION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
