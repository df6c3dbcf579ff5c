use alert_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::ollama::OllamaClient;

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_max_tokens_full() -> u32 {
    1000
}

fn default_max_tokens_brief() -> u32 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens_full")]
    pub max_tokens_full: u32,
    #[serde(default = "default_max_tokens_brief")]
    pub max_tokens_brief: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens_full: default_max_tokens_full(),
            max_tokens_brief: default_max_tokens_brief(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AnalyzerConfig {
    pub fn max_tokens(&self, brief: bool) -> u32 {
        if brief {
            self.max_tokens_brief
        } else {
            self.max_tokens_full
        }
    }

    /// Rejects anything but a loopback Ollama endpoint.
    pub fn validate(&self) -> Result<(), AppError> {
        OllamaClient::new(&self.base_url).map(|_| ())
    }
}
