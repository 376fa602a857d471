//! **Transport wire protocol** — JSON messages discriminated by `event`.
//!
//! The read side is abstracted behind [`Transport`] so the gateway's WebSocket
//! and the test harness's channels drive the same session code. The write side
//! is a plain `mpsc` sender into one writer task, which keeps a single point
//! of serialization and preserves the emission order guarantees.

use crate::error::{VoiceError, VoiceResult};
use crate::turn::TurnState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Base64 audio payload, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Peer -> server messages. Anything that is not `media` is accepted and
/// ignored (session metadata, keepalives).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PeerEvent {
    Media { media: MediaPayload },
    #[serde(other)]
    Other,
}

/// Who a transcript line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Ai,
    System,
}

/// Server -> peer messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    Media { media: MediaPayload },
    State { state: TurnState },
    Transcript { role: TranscriptRole, text: String },
    Clear,
}

impl ServerEvent {
    pub fn media(payload_b64: String) -> Self {
        ServerEvent::Media {
            media: MediaPayload {
                payload: payload_b64,
            },
        }
    }

    pub fn state(state: TurnState) -> Self {
        ServerEvent::State { state }
    }

    pub fn transcript(role: TranscriptRole, text: impl Into<String>) -> Self {
        ServerEvent::Transcript {
            role,
            text: text.into(),
        }
    }
}

/// Read half of the message-framed peer channel.
#[async_trait]
pub trait Transport: Send {
    /// Next raw text message. `Ok(None)` means the peer closed cleanly;
    /// `Err` is a transport failure that terminates the session.
    async fn recv_text(&mut self) -> VoiceResult<Option<String>>;
}

/// In-memory transport over a channel, used by tests and local harnesses.
pub struct ChannelTransport {
    rx: tokio::sync::mpsc::Receiver<String>,
}

impl ChannelTransport {
    pub fn new(rx: tokio::sync::mpsc::Receiver<String>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv_text(&mut self) -> VoiceResult<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

/// Parse one inbound message. Malformed JSON is a [`VoiceError::Decode`]; the
/// ingest loop logs and skips it.
pub fn parse_peer_event(text: &str) -> VoiceResult<PeerEvent> {
    serde_json::from_str(text).map_err(|e| VoiceError::Decode(format!("bad message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_event_parses() {
        let msg = r#"{"event":"media","media":{"payload":"AAAA"}}"#;
        match parse_peer_event(msg).unwrap() {
            PeerEvent::Media { media } => assert_eq!(media.payload, "AAAA"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_events_are_accepted_and_ignored() {
        let msg = r#"{"event":"start","streamSid":"abc123"}"#;
        assert!(matches!(parse_peer_event(msg).unwrap(), PeerEvent::Other));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = parse_peer_event("{not json").unwrap_err();
        assert!(matches!(err, VoiceError::Decode(_)));
    }

    #[test]
    fn server_events_serialize_with_discriminator() {
        let state = serde_json::to_value(ServerEvent::state(TurnState::Speaking)).unwrap();
        assert_eq!(state["event"], "state");
        assert_eq!(state["state"], "SPEAKING");

        let clear = serde_json::to_value(ServerEvent::Clear).unwrap();
        assert_eq!(clear["event"], "clear");

        let t = serde_json::to_value(ServerEvent::transcript(TranscriptRole::Ai, "hi")).unwrap();
        assert_eq!(t["event"], "transcript");
        assert_eq!(t["role"], "ai");
        assert_eq!(t["text"], "hi");

        let m = serde_json::to_value(ServerEvent::media("Zm9v".into())).unwrap();
        assert_eq!(m["event"], "media");
        assert_eq!(m["media"]["payload"], "Zm9v");
    }
}
