use std::time::Duration;

use serde_json::{json, Value};

use super::{expression_prompt, ContentGenerator, GenerationError, PromptContext, Result};

const SERVICE: &str = "gemini";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Content generator backed by the Gemini `generateContent` endpoint
pub struct GeminiGenerator {
    agent: ureq::Agent,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .build();
        Self {
            agent: config.into(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let resp = self
            .agent
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .send_json(payload)
            .map_err(|e| GenerationError::Http {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let json: Value = resp
            .into_body()
            .read_json()
            .map_err(|e| GenerationError::BadResponse {
                service: SERVICE,
                message: e.to_string(),
            })?;

        extract_text(&json).ok_or_else(|| GenerationError::BadResponse {
            service: SERVICE,
            message: "no text in first candidate".to_string(),
        })
    }
}

/// Concatenated text parts of the first candidate, skipping thought parts
pub(crate) fn extract_text(json: &Value) -> Option<String> {
    let parts = json
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

impl ContentGenerator for GeminiGenerator {
    fn generate(&mut self, context: &PromptContext<'_>) -> Result<String> {
        self.complete(&context.render())
    }

    fn classify_expression(&mut self, text: &str, candidates: &[&str]) -> Result<String> {
        self.complete(&expression_prompt(text, candidates))
    }
}
