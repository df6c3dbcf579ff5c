pub mod analyze;
pub mod analyzer;
pub mod config;
pub mod ollama;
