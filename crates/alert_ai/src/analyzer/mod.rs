use alert_core::error::AppError;
use serde_json::{Map, Value};

/// Opaque text-generation collaborator. May fail for any reason; callers degrade, never propagate.
pub trait Analyzer {
    fn analyze(
        &self,
        prompt: &str,
        max_tokens: u32,
        context: &Map<String, Value>,
    ) -> Result<String, AppError>;
}

pub mod ollama_analyzer;

pub use ollama_analyzer::OllamaAnalyzer;
