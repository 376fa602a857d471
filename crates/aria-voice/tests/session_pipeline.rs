//! Integration test: full session pipeline over an in-memory transport.
//!
//! ## Scenarios
//! 1. Silence only: no outbound traffic.
//! 2. One utterance: RECEIVING -> THINKING -> transcripts -> SPEAKING ->
//!    media -> LISTENING, with one state message per transition.
//! 3. Barge-in while SPEAKING: clear precedes the RECEIVING announcement and
//!    no stale media follows it.
//! 4. Malformed payloads are skipped and the session keeps working.
//! 5. STT failure returns the session to LISTENING with no transcript/media.
//! 6. Transport close mid-reply tears everything down.

use aria_voice::{
    run_session, ChannelTransport, Cognition, MemoryStore, PlaceholderLlm, PlaceholderStt,
    PlaceholderTts, ServerEvent, SessionConfig, SttService, VoiceError, VoiceResult, WireProfile,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn media_json(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    serde_json::json!({
        "event": "media",
        "media": { "payload": BASE64.encode(&bytes) }
    })
    .to_string()
}

/// One 20 ms web-profile frame of loud speech-like audio.
fn speech_frame() -> String {
    media_json(&[3000i16; 320])
}

/// One 20 ms web-profile frame of silence.
fn silent_frame() -> String {
    media_json(&[0i16; 320])
}

struct FailingStt;

#[async_trait]
impl SttService for FailingStt {
    async fn transcribe(&self, _wav: Vec<u8>, _sample_rate: u32) -> VoiceResult<String> {
        Err(VoiceError::ExternalService("stt backend down".into()))
    }
}

fn start_session(
    stt: Arc<dyn SttService>,
) -> (
    mpsc::Sender<String>,
    mpsc::Receiver<ServerEvent>,
    JoinHandle<VoiceResult<()>>,
) {
    let (in_tx, in_rx) = mpsc::channel(2048);
    let (ev_tx, ev_rx) = mpsc::channel(2048);
    let services = Cognition {
        stt,
        llm: Arc::new(PlaceholderLlm),
        tts: Arc::new(PlaceholderTts::new()),
        store: Arc::new(MemoryStore::new()),
    };
    let config = SessionConfig::for_profile(WireProfile::Web);
    let handle = tokio::spawn(run_session(
        ChannelTransport::new(in_rx),
        ev_tx,
        1,
        config,
        services,
    ));
    (in_tx, ev_rx, handle)
}

async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed early")
}

fn label(event: &ServerEvent) -> String {
    match event {
        ServerEvent::Media { .. } => "media".into(),
        ServerEvent::State { state } => format!("state:{}", state.as_str()),
        ServerEvent::Transcript { role, .. } => format!("transcript:{role:?}"),
        ServerEvent::Clear => "clear".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn silence_produces_no_outbound_traffic() {
    let (tx, mut rx, handle) = start_session(Arc::new(PlaceholderStt::with_response("hi")));
    for _ in 0..10 {
        tx.send(silent_frame()).await.unwrap();
    }
    drop(tx);
    handle.await.unwrap().unwrap();
    assert!(rx.recv().await.is_none(), "expected a silent session");
}

#[tokio::test(start_paused = true)]
async fn one_utterance_round_trip() {
    let (tx, mut rx, handle) = start_session(Arc::new(PlaceholderStt::with_response("hello there")));

    for _ in 0..10 {
        tx.send(silent_frame()).await.unwrap();
    }
    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }
    for _ in 0..30 {
        tx.send(silent_frame()).await.unwrap();
    }

    let mut labels = Vec::new();
    loop {
        let event = next_event(&mut rx).await;
        let l = label(&event);
        let done = l == "state:LISTENING";
        labels.push(l);
        if done {
            break;
        }
    }

    let media_count = labels.iter().filter(|l| *l == "media").count();
    assert!(media_count > 0, "expected a spoken reply: {labels:?}");
    let non_media: Vec<&str> = labels
        .iter()
        .filter(|l| *l != "media")
        .map(|l| l.as_str())
        .collect();
    assert_eq!(
        non_media,
        vec![
            "state:RECEIVING",
            "state:THINKING",
            "transcript:User",
            "transcript:Ai",
            "state:SPEAKING",
            "state:LISTENING",
        ]
    );
    // Media frames only appear between SPEAKING and LISTENING.
    let speaking = labels.iter().position(|l| l == "state:SPEAKING").unwrap();
    let first_media = labels.iter().position(|l| l == "media").unwrap();
    assert!(first_media > speaking);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn barge_in_clears_before_new_turn() {
    let (tx, mut rx, handle) = start_session(Arc::new(PlaceholderStt::with_response(
        "tell me something long enough to interrupt",
    )));

    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }
    for _ in 0..30 {
        tx.send(silent_frame()).await.unwrap();
    }

    // Wait for the reply to start.
    loop {
        if label(&next_event(&mut rx).await) == "state:SPEAKING" {
            break;
        }
    }

    // Interrupt while frames are still queued.
    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }

    let mut labels = Vec::new();
    loop {
        let event = next_event(&mut rx).await;
        let l = label(&event);
        let done = l == "state:RECEIVING";
        labels.push(l);
        if done {
            break;
        }
    }

    let clear = labels.iter().position(|l| l == "clear").expect("no clear emitted");
    // Nothing but the RECEIVING announcement may follow the clear.
    assert_eq!(labels[clear + 1..], ["state:RECEIVING".to_string()]);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn malformed_messages_are_skipped() {
    let (tx, mut rx, handle) = start_session(Arc::new(PlaceholderStt::with_response("still here")));

    tx.send("{not json at all".to_string()).await.unwrap();
    tx.send(r#"{"event":"media","media":{"payload":"@@not-base64@@"}}"#.to_string())
        .await
        .unwrap();
    // Wrong frame length for the web profile.
    tx.send(media_json(&[0i16; 100])).await.unwrap();
    // Unknown events are fine too.
    tx.send(r#"{"event":"mark","name":"keepalive"}"#.to_string())
        .await
        .unwrap();

    // The session still detects speech afterwards.
    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }
    let event = next_event(&mut rx).await;
    assert_eq!(label(&event), "state:RECEIVING");

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn stt_failure_returns_to_listening() {
    let (tx, mut rx, handle) = start_session(Arc::new(FailingStt));

    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }
    for _ in 0..30 {
        tx.send(silent_frame()).await.unwrap();
    }

    let mut labels = Vec::new();
    loop {
        let event = next_event(&mut rx).await;
        let l = label(&event);
        let done = l == "state:LISTENING";
        labels.push(l);
        if done {
            break;
        }
    }
    assert_eq!(labels, vec!["state:RECEIVING", "state:THINKING", "state:LISTENING"]);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn transport_close_mid_reply_tears_down() {
    let (tx, mut rx, handle) = start_session(Arc::new(PlaceholderStt::with_response(
        "a reply that will be cut off by the hangup",
    )));

    for _ in 0..10 {
        tx.send(speech_frame()).await.unwrap();
    }
    for _ in 0..30 {
        tx.send(silent_frame()).await.unwrap();
    }
    loop {
        if label(&next_event(&mut rx).await) == "state:SPEAKING" {
            break;
        }
    }

    // Hang up while the reply is still streaming.
    drop(tx);
    handle.await.unwrap().unwrap();

    // The event stream ends without a trailing LISTENING announcement.
    let mut saw_listening = false;
    while let Some(event) = rx.recv().await {
        if label(&event) == "state:LISTENING" {
            saw_listening = true;
        }
    }
    assert!(!saw_listening, "no state change may follow teardown");
}
