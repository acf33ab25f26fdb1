//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to the configured LLM
//! endpoint. The orchestrator only ever needs whole answers, so there is no
//! SSE path here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::LlmConfig;

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// A text generator the orchestrator can prompt.
///
/// `InferenceClient` is the production implementation; tests substitute
/// scripted models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply to `prompt`, optionally preceded by a system message.
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Result<String, InferenceError>;

    /// Whether the endpoint is reachable. Never consumes inference tokens.
    async fn health_check(&self) -> bool;

    /// Model name for logs and health output.
    fn model_name(&self) -> &str;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the LLM chat completions endpoint.
pub struct InferenceClient {
    http: HttpClient,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
}

impl InferenceClient {
    /// Build a client from the `llm` config section.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn from_config(config: &LlmConfig) -> Result<Self, InferenceError> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            request_timeout,
        })
    }

    /// The base URL of the model endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a non-streaming chat completion and return the first choice's text.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        // Metadata only; prompts can be large and may carry customer data
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            max_tokens = body.max_tokens,
            "llm request"
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::ResponseParse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion(&body_text)
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Result<String, InferenceError> {
        self.chat_completion(build_messages(system_prompt, prompt))
            .await
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "llm health probe failed");
                false
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Assemble the message list: optional system message, then the user prompt.
pub fn build_messages(system_prompt: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    // The user message is always last
    messages.push(ChatMessage::user(prompt.trim()));
    messages
}

/// Decode a non-streaming completion body into the answer text.
pub fn parse_completion(body: &str) -> Result<String, InferenceError> {
    let resp: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseParse {
            reason: format!("failed to parse completion: {e}"),
        })?;
    Ok(resp.first_text())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
