//! Gateway configuration loaded from `.env` / environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | ARIA_BIND_ADDR | 0.0.0.0:8000 | HTTP/WebSocket bind address. |
//! | ARIA_DB_PATH | storage.db | SQLite store for users and conversations. |
//! | ARIA_WIRE_PROFILE | telephony | Default wire profile: `telephony` or `web`. |
//! | ARIA_VAD_BACKEND | energy | `energy` or `model` (WebRTC VAD). |
//! | ARIA_VAD_ENERGY_THRESHOLD | 500 | RMS at which the energy VAD saturates. |
//! | ARIA_VAD_SMOOTHING | 0.7 | EMA factor for the energy VAD. |
//! | ARIA_SPEECH_GATE | 0.6 | Probability above which a frame counts as speech. |
//! | ARIA_SPEECH_MS | 60 | Sustained speech to open a turn. |
//! | ARIA_SILENCE_MS | 500 | Sustained silence to close a turn. |
//! | ARIA_QUEUE_FRAMES | 150 | Outbound queue depth in frames. |
//! | ARIA_TTS_VOICE | nova | Voice id passed to the TTS service. |
//! | ARIA_HISTORY_LIMIT | 20 | History turns loaded per LLM prompt. |
//! | ARIA_DEV_TOKEN | (unset) | When set, provision a dev user with this token. |

use aria_voice::{SessionConfig, TurnConfig, VadBackend, VadConfig, VoiceError, VoiceResult, WireProfile};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub profile: WireProfile,
    pub vad_backend: VadBackend,
    pub energy_threshold: f32,
    pub smoothing: f32,
    pub speech_gate: f32,
    pub speech_ms: u64,
    pub silence_ms: u64,
    pub queue_frames: usize,
    pub voice: String,
    pub history_limit: usize,
    pub dev_token: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl GatewayConfig {
    pub fn from_env() -> VoiceResult<Self> {
        let profile = match std::env::var("ARIA_WIRE_PROFILE") {
            Ok(v) => v
                .parse()
                .map_err(|_| VoiceError::Config(format!("bad ARIA_WIRE_PROFILE {v:?}")))?,
            Err(_) => WireProfile::Telephony,
        };
        let vad_backend = match std::env::var("ARIA_VAD_BACKEND").as_deref() {
            Ok("model") => VadBackend::Model,
            Ok("energy") | Err(_) => VadBackend::Energy,
            Ok(other) => {
                return Err(VoiceError::Config(format!("bad ARIA_VAD_BACKEND {other:?}")))
            }
        };
        Ok(Self {
            bind_addr: env_or("ARIA_BIND_ADDR", "0.0.0.0:8000".to_string()),
            db_path: env_or("ARIA_DB_PATH", PathBuf::from("storage.db")),
            profile,
            vad_backend,
            energy_threshold: env_or("ARIA_VAD_ENERGY_THRESHOLD", 500.0),
            smoothing: env_or("ARIA_VAD_SMOOTHING", 0.7),
            speech_gate: env_or("ARIA_SPEECH_GATE", 0.6),
            speech_ms: env_or("ARIA_SPEECH_MS", 60),
            silence_ms: env_or("ARIA_SILENCE_MS", 500),
            queue_frames: env_or("ARIA_QUEUE_FRAMES", 150),
            voice: env_or("ARIA_TTS_VOICE", "nova".to_string()),
            history_limit: env_or("ARIA_HISTORY_LIMIT", 20),
            dev_token: std::env::var("ARIA_DEV_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    /// Session configuration for a call on the given wire profile.
    pub fn session_config(&self, profile: WireProfile) -> SessionConfig {
        let mut config = SessionConfig::for_profile(profile);
        config.vad = VadConfig {
            backend: self.vad_backend,
            energy_threshold: self.energy_threshold,
            smoothing: self.smoothing,
            ..VadConfig::default()
        };
        config.turn = TurnConfig {
            frame_ms: profile.frame_ms(),
            speech_gate: self.speech_gate,
            speech_ms: self.speech_ms,
            silence_ms: self.silence_ms,
        };
        config.queue_capacity = self.queue_frames;
        config.voice = self.voice.clone();
        config.history_limit = self.history_limit;
        config
    }
}
