//! **Speech-to-Text** — turn an utterance's PCM into text.
//!
//! Implement `SttService` for any vendor; `OpenAiStt` targets the
//! OpenAI-compatible `/audio/transcriptions` shape (OpenAI, Groq, OpenRouter).

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::time::Duration;

/// Converts one utterance (as a WAV container) into text. An empty string
/// means nothing intelligible was said.
#[async_trait]
pub trait SttService: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>, sample_rate: u32) -> VoiceResult<String>;
}

/// Placeholder STT: returns a fixed string. Use for exercising the pipeline
/// without credentials.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    /// If set, return this instead of the default message.
    pub response: Option<String>,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self {
            response: Some(s.into()),
        }
    }
}

#[async_trait]
impl SttService for PlaceholderStt {
    async fn transcribe(&self, wav: Vec<u8>, sample_rate: u32) -> VoiceResult<String> {
        if let Some(ref r) = self.response {
            return Ok(r.clone());
        }
        Ok(format!(
            "[STT placeholder: {} bytes at {} Hz]",
            wav.len(),
            sample_rate
        ))
    }
}

/// Production STT: OpenAI-compatible transcription API.
/// Uses `STT_API_URL` (e.g. https://api.groq.com/openai/v1), `STT_API_KEY`,
/// and `STT_MODEL` (default whisper-large-v3).
#[derive(Debug, Clone)]
pub struct OpenAiStt {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Model: whisper-large-v3, whisper-1, etc.
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiStt {
    /// Build from environment: STT_API_URL, STT_API_KEY (or LLM_API_KEY), STT_MODEL.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("STT_API_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        let api_key = std::env::var("STT_API_KEY")
            .or_else(|_| std::env::var("LLM_API_KEY"))
            .map_err(|_| VoiceError::Config("STT requires STT_API_KEY or LLM_API_KEY".to_string()))?;
        let model = std::env::var("STT_MODEL").unwrap_or_else(|_| "whisper-large-v3".to_string());
        Self::new(base_url, api_key, model)
    }

    /// Create with explicit config.
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
impl SttService for OpenAiStt {
    async fn transcribe(&self, wav: Vec<u8>, _sample_rate: u32) -> VoiceResult<String> {
        if wav.is_empty() {
            return Ok(String::new());
        }
        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::ExternalService(format!(
                "STT API error {status}: {body}"
            )));
        }
        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        let text = json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_reports_payload_shape() {
        let stt = PlaceholderStt::new();
        let text = stt.transcribe(vec![0; 364], 8000).await.unwrap();
        assert!(text.contains("364"));
        assert!(text.contains("8000"));
    }

    #[tokio::test]
    async fn placeholder_with_response() {
        let stt = PlaceholderStt::with_response("hello world");
        assert_eq!(stt.transcribe(vec![], 8000).await.unwrap(), "hello world");
    }
}
