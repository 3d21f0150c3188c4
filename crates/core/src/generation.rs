use crate::error::GenerationError;
use crate::models::ConversationTurn;
use crate::session::HISTORY_WINDOW;
use crate::traits::ResponseGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the grounding prompt. Only the last [`HISTORY_WINDOW`] turns of
/// `history` are included.
pub fn build_prompt(documents: &[String], query: &str, history: &[ConversationTurn]) -> String {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let mut prompt = String::new();

    for (index, turn) in recent.iter().enumerate() {
        let _ = writeln!(prompt, "Previous Query {}: {}", index + 1, turn.query);
        let _ = writeln!(prompt, "Previous Response {}: {}", index + 1, turn.response);
    }

    let _ = writeln!(prompt, "Now the user is asking: {query}.");
    prompt.push_str("Use the following extracted content:\n");
    for (index, document) in documents.iter().enumerate() {
        let _ = writeln!(prompt, "[{}]\n{}", index + 1, document.trim_end());
    }
    prompt.push_str("If the extracted content is irrelevant to the query, ask the user to rephrase it.\n");

    prompt
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

pub struct GeminiGenerator {
    config: GeminiConfig,
    client: Client,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(
        &self,
        documents: &[String],
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(documents, query, history);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!(model = %self.config.model, documents = documents.len(), "requesting generation");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(first_part_text(&parsed).unwrap_or_else(|| {
            warn!(model = %self.config.model, "generator returned no content");
            NO_RESPONSE_PLACEHOLDER.to_string()
        }))
    }
}

fn first_part_text(payload: &Value) -> Option<String> {
    payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}
