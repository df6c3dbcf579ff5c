use std::path::Path;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::{codes, AppError};

/// A named group of line-start literals that open a new alert inside a blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundaryPattern {
    pub name: String,
    pub prefixes: Vec<String>,
}

impl BoundaryPattern {
    pub fn new(name: impl Into<String>, prefixes: &[&str]) -> Self {
        Self {
            name: name.into(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Known monitoring tool prefixes, in priority order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("standard", &["ПРОМ |", "PROM |", "DEV |"]),
            Self::new("reflex", &["АС Рефлекс"]),
        ]
    }
}

/// Upper bound for either log window setting: one week.
pub const MAX_WINDOW_MINUTES: i64 = 10_080;

fn default_max_workers() -> usize {
    4
}

fn default_fallback_encoding() -> String {
    "windows-1251".to_string()
}

fn default_source_pattern() -> String {
    "*.txt".to_string()
}

fn default_margin_minutes() -> i64 {
    30
}

fn default_lookback_minutes() -> i64 {
    120
}

/// Settings shared by the parser and the batch orchestrator.
///
/// Built once by the host and passed by reference; nothing in the crate caches it globally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,
    #[serde(default = "default_source_pattern")]
    pub source_pattern: String,
    #[serde(default = "BoundaryPattern::defaults")]
    pub boundary_patterns: Vec<BoundaryPattern>,
    #[serde(default = "default_margin_minutes")]
    pub log_window_margin_minutes: i64,
    #[serde(default = "default_lookback_minutes")]
    pub default_lookback_minutes: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            fallback_encoding: default_fallback_encoding(),
            source_pattern: default_source_pattern(),
            boundary_patterns: BoundaryPattern::defaults(),
            log_window_margin_minutes: default_margin_minutes(),
            default_lookback_minutes: default_lookback_minutes(),
        }
    }
}

impl AlertConfig {
    /// Clamped to `0..=MAX_WINDOW_MINUTES` so an unvalidated config cannot overflow.
    pub fn margin(&self) -> Duration {
        Duration::minutes(self.log_window_margin_minutes.clamp(0, MAX_WINDOW_MINUTES))
    }

    pub fn lookback(&self) -> Duration {
        Duration::minutes(self.default_lookback_minutes.clamp(0, MAX_WINDOW_MINUTES))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_workers == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "max_workers must be at least 1"));
        }
        let window = 0..=MAX_WINDOW_MINUTES;
        if !window.contains(&self.log_window_margin_minutes)
            || !window.contains(&self.default_lookback_minutes)
        {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Log window minutes must be between 0 and one week",
            )
            .with_details(format!(
                "margin={}; lookback={}; max={MAX_WINDOW_MINUTES}",
                self.log_window_margin_minutes, self.default_lookback_minutes
            )));
        }
        for pattern in &self.boundary_patterns {
            if pattern.prefixes.is_empty() || pattern.prefixes.iter().any(|p| p.trim().is_empty()) {
                return Err(AppError::new(
                    codes::CONFIG_INVALID,
                    "Boundary pattern has an empty prefix",
                )
                .with_details(format!("pattern={}", pattern.name)));
            }
        }
        if encoding_rs::Encoding::for_label(self.fallback_encoding.as_bytes()).is_none() {
            return Err(AppError::new(codes::CONFIG_INVALID, "Unknown fallback encoding")
                .with_details(format!("label={}", self.fallback_encoding)));
        }
        Ok(())
    }
}

/// Load configuration from a JSON file. No path, or a path that does not exist, yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<AlertConfig, AppError> {
    let Some(path) = path else {
        tracing::debug!("no config path given; using defaults");
        return Ok(AlertConfig::default());
    };
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        return Ok(AlertConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::new(codes::CONFIG_READ_FAILED, "Failed to read config file")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    let config: AlertConfig = serde_json::from_str(&raw).map_err(|e| {
        AppError::new(codes::CONFIG_PARSE_FAILED, "Config file is not valid JSON")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    config.validate()?;

    tracing::info!(
        path = %path.display(),
        max_workers = config.max_workers,
        patterns = config.boundary_patterns.len(),
        "loaded alert config"
    );
    Ok(config)
}
