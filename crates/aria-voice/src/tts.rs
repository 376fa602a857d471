//! **Text-to-Speech** — synthesize the reply into an audio container.
//!
//! The service returns container bytes (WAV); the codec plane decodes,
//! resamples, and frames them for the wire.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::time::Duration;

/// Turns reply text into audio container bytes. An empty vec means nothing to
/// speak (the turn completes silently).
#[async_trait]
pub trait TtsService: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>>;
}

/// Placeholder TTS: emits a WAV of silence sized to the text so the paced
/// egress path can be exercised without an API key.
#[derive(Debug, Default)]
pub struct PlaceholderTts {
    /// Sample rate of the generated silence (default 16 kHz).
    pub sample_rate: u32,
}

impl PlaceholderTts {
    pub fn new() -> Self {
        Self { sample_rate: 16000 }
    }
}

#[async_trait]
impl TtsService for PlaceholderTts {
    async fn synthesize(&self, text: &str, _voice: &str) -> VoiceResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rate = if self.sample_rate == 0 { 16000 } else { self.sample_rate };
        // ~60 ms of silence per character, a rough speaking pace.
        let samples = (text.chars().count().max(1) as u32) * rate * 6 / 100;
        let pcm = vec![0u8; (samples as usize) * 2];
        Ok(crate::codec::wav_from_pcm16(&pcm, rate))
    }
}

/// Production TTS: OpenAI-compatible `/audio/speech`.
/// Uses `TTS_API_URL`, `TTS_API_KEY`, `TTS_MODEL` (default tts-1).
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    pub base_url: String,
    pub api_key: String,
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("LLM_API_KEY"))
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY or LLM_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        Self::new(base_url, api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
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
impl TtsService for OpenAiTts {
    async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        // WAV keeps the decode in the codec plane without a compressed-audio
        // dependency; every OpenAI-compatible speech endpoint offers it.
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": voice,
            "response_format": "wav",
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
                "TTS API error {status}: {body}"
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::ExternalService(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[tokio::test]
    async fn placeholder_tts_empty_text_is_silent() {
        let tts = PlaceholderTts::new();
        assert!(tts.synthesize("  ", "nova").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn placeholder_tts_emits_decodable_wav() {
        let tts = PlaceholderTts::new();
        let wav = tts.synthesize("hello there", "nova").await.unwrap();
        let (pcm, rate) = codec::decode_container(&wav).unwrap();
        assert_eq!(rate, 16000);
        assert!(!pcm.is_empty());
        assert!(pcm.iter().all(|&s| s == 0));
    }
}
