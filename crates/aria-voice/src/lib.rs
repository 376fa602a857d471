//! # Aria Voice - Real-Time Voice-Agent Mediation Core
//!
//! This crate bridges a telephone-grade audio transport with a cognition
//! pipeline (STT → LLM → TTS) to produce a turn-taking conversational agent.
//! Each call runs three concurrent tasks over private session state.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │  ┌───────────┐   ┌────────────┐   ┌─────────────┐            │
//! │  │  Ingest   │ → │ VAD Engine │ → │ Turn Engine │            │
//! │  │ (decode)  │   │ (energy /  │   │ (hysteresis │            │
//! │  │           │   │  model)    │   │  counters)  │            │
//! │  └───────────┘   └────────────┘   └──────┬──────┘            │
//! │        ↑                                 ↓                    │
//! │  ┌───────────┐   ┌────────────┐   ┌─────────────┐            │
//! │  │ Transport │ ← │   Egress   │ ← │  Cognition  │ → STT/LLM/ │
//! │  │  (JSON)   │   │ (20ms pace)│   │ (dispatch)  │    TTS     │
//! │  └───────────┘   └────────────┘   └─────────────┘            │
//! │                        ↑  barge-in: cancel + drain + clear    │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod codec;
pub mod cognition;
mod egress;
pub mod error;
mod ingest;
pub mod llm;
pub mod queue;
pub mod sentiment;
pub mod session;
pub mod store;
pub mod stt;
pub mod transport;
pub mod tts;
pub mod turn;
pub mod vad;

pub use auth::{AuthService, StaticAuth};
pub use cognition::{Cognition, CognitionJob};
pub use error::{VoiceError, VoiceResult};
pub use llm::{ChatMessage, LlmService, OpenAiLlm, PlaceholderLlm, SYSTEM_PROMPT};
pub use queue::OutboundQueue;
pub use session::{run_session, SessionConfig, WireProfile};
pub use store::{ConversationStore, MemoryStore};
pub use stt::{OpenAiStt, PlaceholderStt, SttService};
pub use transport::{
    ChannelTransport, MediaPayload, PeerEvent, ServerEvent, TranscriptRole, Transport,
};
pub use tts::{OpenAiTts, PlaceholderTts, TtsService};
pub use turn::{Transition, TurnConfig, TurnEngine, TurnState};
pub use vad::{build_vad, EnergyVad, ModelVad, VadBackend, VadConfig, VadEngine};
