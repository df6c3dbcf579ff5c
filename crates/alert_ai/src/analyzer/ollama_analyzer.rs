use std::time::Duration;

use alert_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Analyzer;
use crate::config::AnalyzerConfig;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaAnalyzer {
    client: OllamaClient,
    model: String,
    timeout: Duration,
}

impl OllamaAnalyzer {
    pub fn new(client: OllamaClient, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &AnalyzerConfig) -> Result<Self, AppError> {
        Ok(Self::new(
            OllamaClient::new(&cfg.base_url)?,
            cfg.model.clone(),
            Duration::from_secs(cfg.timeout_secs),
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

fn context_system_prompt(context: &Map<String, Value>) -> Option<String> {
    if context.is_empty() {
        return None;
    }
    let fields = serde_json::to_string_pretty(context).ok()?;
    Some(format!("Structured fields already extracted from the alert:\n{fields}"))
}

impl Analyzer for OllamaAnalyzer {
    fn analyze(
        &self,
        prompt: &str,
        max_tokens: u32,
        context: &Map<String, Value>,
    ) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            system: context_system_prompt(context),
            stream: false,
            options: GenerateOptions {
                num_predict: max_tokens,
            },
        };

        let resp = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new(codes::AI_ANALYZE_FAILED, "Failed to encode analysis request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new(codes::AI_ANALYZE_FAILED, "Failed to decode analysis response")
                        .with_details(e.to_string())
                })?;
                if v.response.trim().is_empty() {
                    return Err(AppError::new(
                        codes::AI_ANALYZE_FAILED,
                        "Analysis response was empty",
                    ));
                }
                Ok(v.response)
            }
            Ok(r) => Err(
                AppError::new(codes::AI_ANALYZE_FAILED, "Analysis request failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(
                AppError::new(codes::AI_ANALYZE_FAILED, "Failed to call analysis endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_becomes_system_prompt() {
        assert_eq!(context_system_prompt(&Map::new()), None);

        let mut ctx = Map::new();
        ctx.insert("id".to_string(), Value::from("100"));
        let system = context_system_prompt(&ctx).unwrap();
        assert!(system.contains("\"id\": \"100\""));
    }

    #[test]
    fn request_carries_token_budget() {
        let req = GenerateRequest {
            model: "m",
            prompt: "p",
            system: None,
            stream: false,
            options: GenerateOptions { num_predict: 300 },
        };
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            serde_json::json!({
                "model": "m",
                "prompt": "p",
                "stream": false,
                "options": { "num_predict": 300 }
            })
        );
    }
}
