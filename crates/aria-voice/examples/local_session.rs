//! Drive one session end to end without a network or API keys: scripted
//! caller audio goes in over a channel transport, wire events print to stdout.
//!
//! Run with: cargo run -p aria-voice --example local_session

use aria_voice::{
    run_session, ChannelTransport, Cognition, MemoryStore, PlaceholderLlm, PlaceholderStt,
    PlaceholderTts, ServerEvent, SessionConfig, WireProfile,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use tokio::sync::mpsc;

fn frame(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    serde_json::json!({"event": "media", "media": {"payload": BASE64.encode(&bytes)}}).to_string()
}

#[tokio::main]
async fn main() {
    let (in_tx, in_rx) = mpsc::channel(256);
    let (ev_tx, mut ev_rx) = mpsc::channel(256);

    let services = Cognition {
        stt: Arc::new(PlaceholderStt::with_response("what's the weather like")),
        llm: Arc::new(PlaceholderLlm),
        tts: Arc::new(PlaceholderTts::new()),
        store: Arc::new(MemoryStore::new()),
    };
    let config = SessionConfig::for_profile(WireProfile::Web);
    let session = tokio::spawn(run_session(
        ChannelTransport::new(in_rx),
        ev_tx,
        1,
        config,
        services,
    ));

    let printer = tokio::spawn(async move {
        while let Some(event) = ev_rx.recv().await {
            match event {
                ServerEvent::Media { media } => println!("<- media ({} b64 chars)", media.payload.len()),
                other => println!("<- {}", serde_json::to_string(&other).unwrap()),
            }
        }
    });

    // A short greeting: speech, then enough silence to close the turn.
    for _ in 0..15 {
        in_tx.send(frame(&[3000i16; 320])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    for _ in 0..30 {
        in_tx.send(frame(&[0i16; 320])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    // Leave time for the reply to pace out, then hang up.
    tokio::time::sleep(std::time::Duration::from_secs(8)).await;
    drop(in_tx);

    session.await.unwrap().unwrap();
    printer.await.unwrap();
}
