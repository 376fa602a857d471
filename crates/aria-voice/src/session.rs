//! **Session** — one caller, three tasks, private state.
//!
//! `run_session` wires the ingest loop, the paced egress task, and at most one
//! cognition task over shared per-session state. Nothing here is shared across
//! sessions except the immutable codec tables and the compiled VAD model.

use crate::cognition::Cognition;
use crate::codec;
use crate::egress;
use crate::error::{VoiceError, VoiceResult};
use crate::ingest;
use crate::llm;
use crate::queue::OutboundQueue;
use crate::transport::{ServerEvent, Transport};
use crate::turn::{TurnConfig, TurnEngine};
use crate::vad::{build_vad, VadConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Wire audio profile, fixed at session accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProfile {
    /// 8 kHz mu-law, 160-byte frames at 20 ms, both directions.
    Telephony,
    /// 16 kHz signed 16-bit LE PCM: 640-byte frames in, 6,400-byte (200 ms)
    /// frames out to cut per-message overhead.
    Web,
}

impl WireProfile {
    pub fn sample_rate(&self) -> u32 {
        match self {
            WireProfile::Telephony => 8000,
            WireProfile::Web => 16000,
        }
    }

    /// Wire bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        match self {
            WireProfile::Telephony => 8000,
            WireProfile::Web => 32000,
        }
    }

    pub fn frame_ms(&self) -> u64 {
        20
    }

    pub fn inbound_frame_bytes(&self) -> usize {
        (self.byte_rate() as u64 * self.frame_ms() / 1000) as usize
    }

    pub fn outbound_frame_bytes(&self) -> usize {
        match self {
            WireProfile::Telephony => 160,
            WireProfile::Web => 6400,
        }
    }

    /// Wall-clock duration of `len` wire bytes, for pacing.
    pub fn frame_duration(&self, len: usize) -> Duration {
        Duration::from_micros(len as u64 * 1_000_000 / self.byte_rate() as u64)
    }

    /// Decode one inbound frame to PCM. Length must match the profile.
    pub fn decode_frame(&self, raw: &[u8]) -> VoiceResult<Vec<i16>> {
        if raw.len() != self.inbound_frame_bytes() {
            return Err(VoiceError::Decode(format!(
                "frame length mismatch: got {}, expected {}",
                raw.len(),
                self.inbound_frame_bytes()
            )));
        }
        match self {
            WireProfile::Telephony => Ok(codec::mulaw_decode(raw)),
            WireProfile::Web => codec::pcm_from_le_bytes(raw),
        }
    }

    /// Encode reply PCM (already at the wire rate) into wire bytes.
    pub fn encode_pcm(&self, pcm: &[i16]) -> Vec<u8> {
        match self {
            WireProfile::Telephony => codec::mulaw_encode(pcm),
            WireProfile::Web => codec::pcm_to_le_bytes(pcm),
        }
    }
}

impl std::str::FromStr for WireProfile {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telephony" | "mulaw" => Ok(WireProfile::Telephony),
            "web" | "pcm16" => Ok(WireProfile::Web),
            other => Err(VoiceError::Config(format!("unknown wire profile {other:?}"))),
        }
    }
}

/// Everything one session needs beyond its transport and user identity.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub profile: WireProfile,
    pub vad: VadConfig,
    pub turn: TurnConfig,
    /// Outbound queue depth in frames (default ~3 s of audio).
    pub queue_capacity: usize,
    /// History turns loaded for the LLM prompt.
    pub history_limit: usize,
    /// TTS voice id.
    pub voice: String,
    pub system_prompt: String,
    pub stt_deadline: Duration,
    pub llm_deadline: Duration,
    pub tts_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_profile(WireProfile::Telephony)
    }
}

impl SessionConfig {
    pub fn for_profile(profile: WireProfile) -> Self {
        Self {
            profile,
            vad: VadConfig::default(),
            turn: TurnConfig {
                frame_ms: profile.frame_ms(),
                ..TurnConfig::default()
            },
            queue_capacity: 150,
            history_limit: 20,
            voice: "nova".to_string(),
            system_prompt: llm::SYSTEM_PROMPT.to_string(),
            stt_deadline: Duration::from_secs(10),
            llm_deadline: Duration::from_secs(15),
            tts_deadline: Duration::from_secs(20),
        }
    }
}

/// Per-session state shared between the three tasks.
#[derive(Clone)]
pub(crate) struct Shared {
    pub turn: Arc<Mutex<TurnEngine>>,
    pub queue: Arc<OutboundQueue>,
    pub events: mpsc::Sender<ServerEvent>,
    pub config: Arc<SessionConfig>,
    pub services: Cognition,
    pub user_id: i64,
}

impl Shared {
    /// Emit one wire event; a closed writer means the transport is gone.
    pub async fn send(&self, event: ServerEvent) -> VoiceResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| VoiceError::Transport("event writer closed".to_string()))
    }
}

/// Drive one call end to end. Returns when the transport closes or fails;
/// by then the egress task has exited and any cognition job is cancelled.
pub async fn run_session<T: Transport>(
    mut transport: T,
    events: mpsc::Sender<ServerEvent>,
    user_id: i64,
    config: SessionConfig,
    services: Cognition,
) -> VoiceResult<()> {
    let vad = build_vad(&config.vad, config.profile.sample_rate())?;
    let profile = config.profile;
    let shared = Shared {
        turn: Arc::new(Mutex::new(TurnEngine::new(&config.turn))),
        queue: Arc::new(OutboundQueue::new(config.queue_capacity)),
        events,
        config: Arc::new(config),
        services,
        user_id,
    };

    info!(user_id, ?profile, "session started");
    let egress_task = tokio::spawn(egress::run(
        Arc::clone(&shared.queue),
        shared.events.clone(),
        profile,
    ));

    let result = ingest::run(&mut transport, shared.clone(), vad).await;

    shared.queue.close();
    let _ = egress_task.await;
    debug!(user_id, "session tasks stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telephony_profile_dimensions() {
        let p = WireProfile::Telephony;
        assert_eq!(p.sample_rate(), 8000);
        assert_eq!(p.inbound_frame_bytes(), 160);
        assert_eq!(p.outbound_frame_bytes(), 160);
        assert_eq!(p.frame_duration(160), Duration::from_millis(20));
    }

    #[test]
    fn web_profile_dimensions() {
        let p = WireProfile::Web;
        assert_eq!(p.sample_rate(), 16000);
        assert_eq!(p.inbound_frame_bytes(), 640);
        assert_eq!(p.outbound_frame_bytes(), 6400);
        assert_eq!(p.frame_duration(6400), Duration::from_millis(200));
    }

    #[test]
    fn frame_length_is_enforced() {
        let err = WireProfile::Telephony.decode_frame(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, VoiceError::Decode(_)));
        assert!(WireProfile::Telephony.decode_frame(&[0xFFu8; 160]).is_ok());
    }

    #[test]
    fn telephony_decode_is_mulaw() {
        let pcm = WireProfile::Telephony.decode_frame(&[0xFFu8; 160]).unwrap();
        assert!(pcm.iter().all(|&s| s == 0));
    }

    #[test]
    fn profile_parses_from_str() {
        assert_eq!("telephony".parse::<WireProfile>().unwrap(), WireProfile::Telephony);
        assert_eq!("web".parse::<WireProfile>().unwrap(), WireProfile::Web);
        assert!("isdn".parse::<WireProfile>().is_err());
    }
}
