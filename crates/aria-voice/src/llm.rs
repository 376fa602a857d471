//! **Language model** — one chat completion per turn, over recent history.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed system prompt for the voice persona. Replies must stay short enough
/// to synthesize and speak with low latency.
pub const SYSTEM_PROMPT: &str = "You are a witty, ultra-fast AI voice assistant. \
Keep your answers strictly under 2 sentences. Speak naturally. \
Do not use asterisks or formatting.";

/// One chat message in OpenAI wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Produces the assistant's reply for a prepared message list.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> VoiceResult<String>;
}

/// Placeholder LLM: echoes the last user message. Use for pipeline tests.
#[derive(Debug, Default)]
pub struct PlaceholderLlm;

#[async_trait]
impl LlmService for PlaceholderLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> VoiceResult<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Ok(format!("You said: {last_user}"))
    }
}

/// Production LLM: OpenAI-compatible chat completions.
/// Uses `LLM_API_URL`, `LLM_API_KEY`, and `LLM_MODEL` (default llama-3.1-8b-instant).
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiLlm {
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| VoiceError::Config("LLM requires LLM_API_KEY".to_string()))?;
        let model =
            std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".to_string());
        Self::new(base_url, api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl LlmService for OpenAiLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> VoiceResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::ExternalService(format!(
                "LLM API error {status}: {body}"
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(VoiceError::ExternalService(
                "LLM returned an empty completion".to_string(),
            ));
        }
        Ok(text)
    }
}
